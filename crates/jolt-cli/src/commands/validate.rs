use jolt_core::contacts::phone;

pub fn run(number: &str) -> Result<(), Box<dyn std::error::Error>> {
    if phone::validate(number) {
        println!("valid");
    } else {
        println!("invalid");
        std::process::exit(1);
    }
    Ok(())
}
