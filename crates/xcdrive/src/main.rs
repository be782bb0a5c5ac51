fn main() {
    match xcdrive::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(xcdrive::exit_code_for(&err));
        }
    }
}
