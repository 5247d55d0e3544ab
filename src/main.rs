fn main() -> anyhow::Result<()> {
    twpcap_lib::run()
}
