fn main() {
    #[cfg(feature = "cli")]
    stitchopt::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("stitchopt: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
