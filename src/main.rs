fn main() {
    if let Err(e) = labelcrop::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
