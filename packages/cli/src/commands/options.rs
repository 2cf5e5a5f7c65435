use anyhow::Result;
use clap::Args;
use colored::Colorize;
use formset_client::{ClientConfig, HttpTransport, Transport};
use std::path::Path;

#[derive(Args, Debug)]
pub struct OptionsArgs {
    /// Field whose options are looked up, e.g. `order.customer`
    pub field: String,

    /// Search text
    #[arg(default_value = "")]
    pub query: String,
}

pub fn options(args: OptionsArgs, cwd: &Path) -> Result<()> {
    let config = ClientConfig::load(cwd)?;
    let transport = HttpTransport::new(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let page = runtime.block_on(transport.fetch_options(&args.field, &args.query))?;

    for item in &page.items {
        println!("{}  {}", item.id.to_string().dimmed(), item.label);
    }
    println!();
    println!("   Showing {} of {}", page.count, page.total_count);
    Ok(())
}
