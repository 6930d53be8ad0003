fn main() -> anyhow::Result<()> {
    nbody_flythrough::app::run()
}
