use super::FormsetInput;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct PayloadArgs {
    #[command(flatten)]
    pub input: FormsetInput,

    /// Run client-side validation and report failures before printing
    #[arg(long)]
    pub validate: bool,
}

pub fn payload(args: PayloadArgs) -> Result<()> {
    let mut formset = args.input.load()?;

    if args.validate {
        let report = formset.validate();
        if !report.valid {
            for path in &report.invalid_fields {
                let reasons = formset
                    .field(path)
                    .map(|f| f.validity().reasons().join(" "))
                    .unwrap_or_default();
                eprintln!("{} {}: {}", "✗".red(), path, reasons);
            }
            for (collection, validity) in &report.collections {
                if validity.below_minimum {
                    eprintln!("{} {}: too few instances", "✗".red(), collection);
                }
            }
            return Err(anyhow::anyhow!("Formset is not valid"));
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&formset.submission_payload())?
    );
    Ok(())
}
