fn main() -> anyhow::Result<()> {
    feedpick::init();
    feedpick::cli::run()
}
