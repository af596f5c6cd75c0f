use clap::Subcommand;
use jolt_core::{Contact, ContactRegistry, Database};

#[derive(Subcommand)]
pub enum ContactsAction {
    /// Register an emergency contact
    Add {
        name: String,
        /// Ten-digit mobile number; spaces and dashes are ignored
        number: String,
    },
    /// Remove a contact
    Remove { name: String, number: String },
    /// Replace a contact, keeping its position in the list
    Update {
        old_name: String,
        old_number: String,
        new_name: String,
        new_number: String,
    },
    /// List contacts with masked numbers
    List {
        /// Print full records as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ContactsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut registry = ContactRegistry::load(&db)?;

    match action {
        ContactsAction::Add { name, number } => {
            let contact = Contact::new(&name, &number)?;
            registry.add(contact.clone())?;
            registry.save(&db)?;
            println!("Contact added: {contact}");
        }
        ContactsAction::Remove { name, number } => {
            let contact = Contact::new(&name, &number)?;
            if !registry.remove(&contact) {
                return Err(format!("contact not found: {name}").into());
            }
            registry.save(&db)?;
            println!("Contact removed: {contact}");
        }
        ContactsAction::Update {
            old_name,
            old_number,
            new_name,
            new_number,
        } => {
            let old = Contact::new(&old_name, &old_number)?;
            let new = Contact::new(&new_name, &new_number)?;
            registry.update(&old, new.clone())?;
            registry.save(&db)?;
            println!("Contact updated: {new}");
        }
        ContactsAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(registry.list())?);
            } else if registry.is_empty() {
                println!("No emergency contacts set");
            } else {
                for (i, contact) in registry.list().iter().enumerate() {
                    println!("{}. {contact}", i + 1);
                }
            }
        }
    }
    Ok(())
}
