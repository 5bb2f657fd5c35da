//! Test logger - send everything to the terminal for cargo test

pub fn test_logger() {
    //  Stderr, so log lines don't mix with responses printed by tests.
    //  Only the first call in a test binary takes effect.
    let _ = simplelog::CombinedLogger::init(vec![simplelog::TermLogger::new(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    )]);
}
