//! The `seed` command: load a setup YAML file and run the same transactional
//! submission the wizard uses.

use std::path::Path;

use aeodb_core::setup::load_setup_file;

pub async fn run(file: &Path, account: i64, dry_run: bool) -> anyhow::Result<()> {
    let plan = load_setup_file(file)?;

    let persona_count: usize = plan.icps.iter().map(|icp| icp.personas.len()).sum();
    println!(
        "loaded '{}': {} products, {} competitors, {} icps, {} personas",
        plan.company.name,
        plan.products.len(),
        plan.competitors.len(),
        plan.icps.len(),
        persona_count
    );

    if dry_run {
        println!("dry run: validation passed, nothing written");
        return Ok(());
    }

    let pool = aeodb_db::connect_pool_from_env().await?;
    let company_id = aeodb_db::submit_setup(&pool, account, &plan).await?;
    println!("created company {company_id} for account {account}");

    Ok(())
}
