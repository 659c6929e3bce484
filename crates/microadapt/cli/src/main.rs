fn main() -> anyhow::Result<()> {
    microadapt_cli::run()
}
