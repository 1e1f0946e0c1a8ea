//! Clinic Media Vault - CLI
//!
//! Operator tooling for the encrypted media pipeline: upload and fetch
//! single photos, run the end-to-end integrity check, provision keys.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use clinic_media_vault::crypto::OrgKey;
use clinic_media_vault::{MediaReference, MediaVault, VaultConfig};

#[derive(Parser)]
#[command(name = "clinic-media")]
#[command(version = clinic_media_vault::VERSION)]
#[command(about = "Clinic Media Vault - encrypted chart photo pipeline")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sandbox mode: in-memory backends, fixed public key
    #[arg(long)]
    sandbox: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and upload a photo
    Upload {
        /// Photo path (JPEG/PNG/WebP)
        photo: PathBuf,

        /// Organization id
        #[arg(long)]
        org: String,

        /// Client id
        #[arg(long)]
        client: String,
    },

    /// Download, decrypt, and export a photo
    Fetch {
        /// Media reference (URL)
        reference: String,

        /// Output path for the decrypted JPEG
        #[arg(short, long)]
        output: PathBuf,

        /// Organization id
        #[arg(long)]
        org: String,
    },

    /// Run the end-to-end encryption integrity check
    Check {
        /// Organization id
        #[arg(long, default_value = "org-test")]
        org: String,

        /// Client id
        #[arg(long, default_value = "client-test")]
        client: String,
    },

    /// Generate a fresh organization key for keystore provisioning
    GenKey,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn build_vault(cli_config: &Option<PathBuf>, sandbox: bool) -> anyhow::Result<MediaVault> {
    let mut config = match cli_config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => VaultConfig::from_env(),
    };

    if sandbox {
        config.sandbox = true;
    }

    Ok(MediaVault::new(config)?)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Upload { photo, org, client } => {
            let vault = build_vault(&cli.config, cli.sandbox)?;

            let raw = std::fs::read(&photo)
                .with_context(|| format!("reading {}", photo.display()))?;
            let image = image::load_from_memory(&raw)
                .with_context(|| format!("decoding {}", photo.display()))?;

            println!("📤 Uploading encrypted photo for {org}/{client}...");
            let reference = vault.upload_photo(&image, &org, &client).await?;

            println!("✅ Uploaded!");
            println!("   Reference: {reference}");
            println!("   Attach this reference to the treatment entry record.");
        }

        Commands::Fetch {
            reference,
            output,
            org,
        } => {
            let vault = build_vault(&cli.config, cli.sandbox)?;
            let reference = MediaReference::new(reference);

            println!("📥 Fetching and decrypting...");
            let loaded = vault.export_photo(&reference, &org, &output).await?;

            println!("✅ Decrypted photo written to: {}", output.display());
            println!(
                "   {}x{} pixels, {} bytes",
                loaded.width,
                loaded.height,
                loaded.byte_size()
            );
        }

        Commands::Check { org, client } => {
            let vault = build_vault(&cli.config, cli.sandbox)?;

            println!("🔍 Running encryption round-trip check for {org}/{client}...");
            let run = vault.check(&org, &client).await;

            println!("{:-<50}", "");
            for step in &run.steps {
                let mark = if step.ok { "✅" } else { "❌" };
                println!("{mark} {:<22} {}", step.step.to_string(), step.detail);
            }
            println!("{:-<50}", "");

            if run.passed {
                println!("💚 Encryption pipeline is healthy");
            } else {
                anyhow::bail!("integrity check failed - see step reports above");
            }
        }

        Commands::GenKey => {
            let key = OrgKey::generate();
            println!("🔑 New organization key (base64):");
            println!("{}", key.to_base64());
            println!();
            println!("Store as the keystore document for the organization:");
            println!("  organizations/{{org-id}}/encryption");
            println!("  {{\"key\": \"<value above>\"}}");
        }
    }

    Ok(())
}
