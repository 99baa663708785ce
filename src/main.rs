fn main() -> anyhow::Result<()> {
    lobster_scene::run()
}
