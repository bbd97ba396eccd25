use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use zatca_core::{
    config::EnvironmentType,
    egs::{Egs, EgsUnitInfo},
    invoice::{
        C14nMode, LibxmlCanonicalizer, QrPayload, SigningOptions, decode_tlv, embedded_payload,
        hash::invoice_hash_with, sign_document,
    },
    xml::XmlDocument,
};

#[derive(Parser)]
#[command(name = "zatca")]
#[command(about = "Sign and inspect ZATCA simplified tax invoices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Inclusive,
    Exclusive,
    Inclusive11,
}

impl From<Mode> for C14nMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Inclusive => C14nMode::Inclusive,
            Mode::Exclusive => C14nMode::Exclusive,
            Mode::Inclusive11 => C14nMode::Inclusive11,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the base64 invoice hash.
    Hash {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long, value_enum, default_value = "inclusive")]
        c14n: Mode,
    },
    /// Print the QR payload: the embedded one, or the five-field payload of
    /// an unsigned invoice.
    Qr {
        #[arg(long)]
        invoice: PathBuf,
        /// Print the TLV fields instead of the base64 payload.
        #[arg(long)]
        decode: bool,
    },
    /// Sign an invoice that still carries the signing placeholders. Writes
    /// the signed markup to `--output` and prints the invoice hash, or prints
    /// the markup when no output is given.
    Sign {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long)]
        certificate: PathBuf,
        #[arg(long)]
        private_key: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// RFC 3339 signing time, defaults to now.
        #[arg(long)]
        signing_time: Option<DateTime<Utc>>,
    },
    /// Generate an EGS key and onboarding CSR.
    Csr {
        /// EGS unit description as JSON.
        #[arg(long)]
        egs: PathBuf,
        #[arg(long)]
        solution_name: String,
        #[arg(long, default_value = "non_production")]
        env: EnvironmentType,
        #[arg(long)]
        private_key_out: PathBuf,
        #[arg(long)]
        csr_out: PathBuf,
    },
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_invoice(path: &Path) -> Result<XmlDocument> {
    let xml = read(path)?;
    XmlDocument::parse(&xml).with_context(|| format!("failed to parse {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Hash { invoice, c14n } => {
            let doc = read_invoice(&invoice)?;
            let hash = invoice_hash_with(&doc, &LibxmlCanonicalizer::new(c14n.into()))?;
            println!("{hash}");
        }
        Commands::Qr { invoice, decode } => {
            let doc = read_invoice(&invoice)?;
            let payload = match embedded_payload(&doc) {
                Some(payload) => payload.to_string(),
                None => QrPayload::from_document(&doc)?.encode_phase_one()?,
            };
            if decode {
                for (index, field) in decode_tlv(&payload)?.iter().enumerate() {
                    match std::str::from_utf8(field) {
                        Ok(text) => println!("{}: {text}", index + 1),
                        Err(_) => println!("{}: <{} bytes>", index + 1, field.len()),
                    }
                }
            } else {
                println!("{payload}");
            }
        }
        Commands::Sign {
            invoice,
            certificate,
            private_key,
            output,
            signing_time,
        } => {
            let doc = read_invoice(&invoice)?;
            let options = SigningOptions {
                signing_time,
                ..SigningOptions::default()
            };
            let signed = sign_document(&doc, &read(&certificate)?, &read(&private_key)?, options)?;
            tracing::info!(invoice_hash = signed.invoice_hash(), "signed invoice");
            match output {
                Some(path) => {
                    fs::write(&path, signed.xml())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("{}", signed.invoice_hash());
                }
                None => println!("{}", signed.xml()),
            }
        }
        Commands::Csr {
            egs,
            solution_name,
            env,
            private_key_out,
            csr_out,
        } => {
            let info: EgsUnitInfo = serde_json::from_str(&read(&egs)?)
                .with_context(|| format!("invalid EGS description in {}", egs.display()))?;
            let mut unit = Egs::new(info, env);
            unit.generate_keys_and_csr(&solution_name)?;
            let (Some(key), Some(csr)) = (unit.private_key(), unit.csr()) else {
                bail!("key generation produced no output");
            };
            fs::write(&private_key_out, key)
                .with_context(|| format!("failed to write {}", private_key_out.display()))?;
            fs::write(&csr_out, csr)
                .with_context(|| format!("failed to write {}", csr_out.display()))?;
        }
    }

    Ok(())
}
