use super::FormsetInput;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use formset_client::{ClientConfig, FormsetClient, HttpTransport};
use formset_runtime::{EffectKind, Formset, Outcome, Progress};
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub input: FormsetInput,

    /// Run this control's action chain instead of a bare submission
    #[arg(short, long)]
    pub control: Option<String>,
}

pub fn submit(args: SubmitArgs, cwd: &Path) -> Result<()> {
    let config = ClientConfig::load(cwd)?;
    info!(endpoint = %config.endpoint, "submitting");

    let formset = args.input.load()?;
    let client = FormsetClient::new(formset, HttpTransport::new(&config)?);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(async {
        match &args.control {
            Some(control) => match client.activate(control).await? {
                Progress::Completed(outcome) => Ok(outcome),
                other => Err(anyhow::anyhow!("Chain did not complete: {:?}", other)),
            },
            None => Ok::<_, anyhow::Error>(client.submit().await?),
        }
    })?;

    for effect in client.take_effects() {
        print_effect(&effect.kind);
    }

    let accepted = client.read(|formset| report(formset, outcome));
    if !accepted {
        std::process::exit(1);
    }
    Ok(())
}

fn print_effect(effect: &EffectKind) {
    match effect {
        EffectKind::Okay => println!("{} okay", "✓".green()),
        EffectKind::Bummer => println!("{} bummer", "✗".red()),
        EffectKind::Navigate(url) => println!("→ {}", url),
        EffectKind::Emit(event) => println!("⚡ {}", event),
        EffectKind::ScrollToError(Some(path)) => println!("↧ {}", path),
        EffectKind::ScrollToError(None) | EffectKind::Spinner | EffectKind::Reload => {}
    }
}

fn report(formset: &Formset, outcome: Outcome) -> bool {
    if outcome == Outcome::Success {
        println!("✨ {} Submission accepted", "Done".green().bold());
        if let Some(url) = formset.success_url() {
            println!("   Success URL: {}", url);
        }
        return true;
    }

    println!("{} Submission failed", "✗".red().bold());
    for error in formset.non_field_errors() {
        println!("   {}", error);
    }
    for path in formset.field_paths() {
        if let Some(field) = formset.field(&path) {
            if field.validity().is_invalid() {
                println!(
                    "   {} {}",
                    format!("{}:", path).yellow(),
                    field.validity().reasons().join(" ")
                );
            }
        }
    }
    false
}
