//! PwSeal CLI - encrypt and decrypt short messages with a shared password.
//!
//! Send the token over one channel and the password over another.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use pwseal_common::{Error, Scheme};
use pwseal_crypto::{
    decrypt_message_with, detect_scheme, encrypt_message_with, Fernet, KdfParams, KeyDeriver, SaltedCipher, DEFAULT_ITERATIONS, DEFAULT_SALT,
};

const DECRYPT_FAILED: &str = "Error: Failed to decrypt. Wrong password?";

#[derive(Parser)]
#[command(name = "pwseal")]
#[command(about = "PwSeal - Password-based message encryption")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// PBKDF2 iteration count. Changing it breaks interop.
    #[arg(long, global = true, env = "PWSEAL_ITERATIONS", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// PBKDF2 salt for fernet tokens. Changing it breaks interop.
    #[arg(long, global = true, env = "PWSEAL_SALT")]
    salt: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a message into a token.
    Encrypt {
        /// Message to encrypt.
        message: String,

        /// Shared password (prompted if omitted).
        password: Option<String>,

        /// Token scheme: "fernet" or "salted".
        #[arg(short, long, default_value = "fernet")]
        scheme: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decrypt a token back into its message.
    Decrypt {
        /// Token to decrypt.
        token: String,

        /// Shared password (prompted if omitted).
        password: Option<String>,

        /// Reject fernet tokens older than this many seconds.
        #[arg(long)]
        ttl: Option<u64>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a token's scheme and, for fernet tokens, when it was created.
    Inspect {
        /// Token to inspect.
        token: String,

        /// Shared password (prompted if omitted).
        password: Option<String>,
    },
}

#[derive(Serialize)]
struct EncryptOutput<'a> {
    scheme: Scheme,
    token: &'a str,
}

#[derive(Serialize)]
struct DecryptOutput<'a> {
    scheme: Scheme,
    message: &'a str,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let params = kdf_params(cli.iterations, cli.salt.as_deref())?;

    match cli.command {
        Commands::Encrypt {
            message,
            password,
            scheme,
            json,
        } => cmd_encrypt(&message, password, &scheme, json, &params),

        Commands::Decrypt {
            token,
            password,
            ttl,
            json,
        } => cmd_decrypt(&token, password, ttl, json, &params),

        Commands::Inspect { token, password } => cmd_inspect(&token, password, &params),
    }
}

/// Build KDF parameters from the global flags.
fn kdf_params(iterations: u32, salt: Option<&str>) -> Result<KdfParams> {
    let params = KdfParams::new(
        salt.map_or_else(|| DEFAULT_SALT.to_vec(), |salt| salt.as_bytes().to_vec()),
        iterations,
    );

    params.validate().context("Invalid KDF parameters")?;
    if !params.is_default() {
        warn!("Using non-default KDF parameters; tokens will not interoperate");
    }

    Ok(params)
}

/// Use the password argument or prompt for it securely.
fn password_or_prompt(password: Option<String>) -> Result<Zeroizing<String>> {
    match password {
        Some(password) => Ok(Zeroizing::new(password)),
        None => rpassword::prompt_password("Enter password: ")
            .map(Zeroizing::new)
            .context("Failed to read password"),
    }
}

/// Encrypt a message.
fn cmd_encrypt(
    message: &str,
    password: Option<String>,
    scheme: &str,
    json: bool,
    params: &KdfParams,
) -> Result<()> {
    let scheme: Scheme = scheme.parse().context("Invalid scheme")?;
    let password = password_or_prompt(password)?;

    let token = encrypt_message_with(message, &password, scheme, params)
        .context("Failed to encrypt message")?;

    if json {
        println!("{}", serde_json::to_string(&EncryptOutput { scheme, token: &token })?);
    } else {
        println!("\nEncrypted message:");
        println!("{}", token);
        println!("\nSend this to the recipient along with the password (via a different channel)");
    }

    Ok(())
}

/// Decrypt a token.
///
/// Verification failures are reported and swallowed; they are an expected
/// outcome, not a crash.
fn cmd_decrypt(
    token: &str,
    password: Option<String>,
    ttl: Option<u64>,
    json: bool,
    params: &KdfParams,
) -> Result<()> {
    let password = password_or_prompt(password)?;

    let result = detect_scheme(token).and_then(|scheme| {
        let message = match ttl {
            Some(secs) => open_with_ttl(token, &password, scheme, Duration::from_secs(secs), params)?,
            None => decrypt_message_with(token, &password, params)?,
        };
        Ok((scheme, Zeroizing::new(message)))
    });

    match result {
        Ok((scheme, message)) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string(&DecryptOutput {
                        scheme,
                        message: &message
                    })?
                );
            } else {
                println!("\nDecrypted message:");
                println!("{}", message.as_str());
            }
            Ok(())
        }
        Err(e) if e.is_decrypt_failure() => {
            debug!(error = %e, "Decryption failed");
            println!("{}", DECRYPT_FAILED);
            Ok(())
        }
        Err(e) => Err(e).context("Failed to decrypt message"),
    }
}

fn open_with_ttl(
    token: &str,
    password: &str,
    scheme: Scheme,
    ttl: Duration,
    params: &KdfParams,
) -> pwseal_common::Result<String> {
    match scheme {
        Scheme::Fernet => {
            let deriver = KeyDeriver::new(params.clone())?;
            Fernet::new(deriver.derive(password)).open_with_ttl(token, ttl)
        }
        Scheme::Salted => Err(Error::InvalidInput(
            "--ttl only applies to fernet tokens".to_string(),
        )),
    }
}

/// Show what a token is without printing its message.
fn cmd_inspect(token: &str, password: Option<String>, params: &KdfParams) -> Result<()> {
    let scheme = match detect_scheme(token) {
        Ok(scheme) => scheme,
        Err(e) if e.is_decrypt_failure() => {
            println!("Not a recognized token.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to inspect token"),
    };
    let password = password_or_prompt(password)?;

    println!("Token Information:");
    println!("  Scheme: {}", scheme);

    let created = match scheme {
        Scheme::Fernet => {
            let deriver = KeyDeriver::new(params.clone())?;
            Fernet::new(deriver.derive(&password))
                .timestamp(token)
                .map(|secs| Some(format_timestamp(secs)))
        }
        Scheme::Salted => SaltedCipher::with_iterations(&password, params.iterations)
            .and_then(|cipher| cipher.open_bytes(token))
            .map(|_| None),
    };

    match created {
        Ok(created) => {
            println!("  Authentic: yes");
            match created {
                Some(created) => println!("  Created: {}", created),
                None => println!("  Created: not recorded"),
            }
            Ok(())
        }
        Err(e) if e.is_decrypt_failure() => {
            println!("  Authentic: no (wrong password?)");
            Ok(())
        }
        Err(e) => Err(e).context("Failed to inspect token"),
    }
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|created| created.to_rfc3339())
        .unwrap_or_else(|| format!("{} (out of range)", secs))
}
