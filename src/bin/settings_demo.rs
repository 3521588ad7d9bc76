use sessionkeep::settings::*;

fn main() -> anyhow::Result<()> {
    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("{:#?}", project_settings);

    println!(
        "storage={} oauth={} hosts={:?}",
        project_settings.storage.backend,
        project_settings.oauth.backend,
        project_settings.fetch_cache.allowed_hosts
    );
    Ok(())
}
