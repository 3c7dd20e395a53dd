fn main() {
    if let Err(err) = field_mapper::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
