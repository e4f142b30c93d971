fn main() {
    std::process::exit(context_cache_cli::run());
}
