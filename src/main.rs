fn main() -> anyhow::Result<()> {
    corner_pos_lib::run()
}
