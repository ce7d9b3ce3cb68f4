use homd::config::EngineConfig;

fn main() -> anyhow::Result<()> {
    homd::run(EngineConfig::from_env())
}
