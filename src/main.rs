fn main() {
    if let Err(err) = sheet_append::run() {
        eprintln!("error: {}", sheet_append::describe_error(&err));
        std::process::exit(1);
    }
}
