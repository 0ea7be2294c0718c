fn main() -> anyhow::Result<()> {
    minizinc_driver::runner::run()
}
