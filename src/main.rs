fn main() {
    if let Err(err) = avlab::cli::run() {
        avlab::ui::eprintln_error(&err);
        std::process::exit(avlab::exit::exit_code(&err));
    }
}
