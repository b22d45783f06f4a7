//! lockbox - Client-side encryption tool
//!
//! Usage:
//!   lockbox init                    - Write a default configuration file
//!   lockbox encrypt-text [TEXT]     - Encrypt text under a password
//!   lockbox encrypt-file <FILE>     - Encrypt a file, writing blob and metadata
//!   lockbox keygen                  - Generate an RSA key pair
//!   lockbox hash [TEXT]             - Digest text with SHA-2

use clap::{Parser, Subcommand};
use lockbox::{
    config::Config,
    crypto::{
        hash::{self, HashAlgorithm},
        random, AesKeySize, EncryptedPayload, RsaKeySize, SymmetricKey,
    },
    engine::ProgressReceiver,
    file::{FileMetadata, MetadataIndex},
    records::{EncryptedRecord, FileInfo, SealedKeyPair},
    Engine, Error, Result,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;
use zeroize::Zeroizing;

const ENCRYPTED_EXTENSION: &str = "encrypted";
const METADATA_SUFFIX: &str = ".meta.json";

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client-side encryption of text, files and keys")]
struct Cli {
    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Encrypt text under a password (reads stdin if TEXT is omitted)
    EncryptText {
        text: Option<String>,

        /// Wrap the payload in a named record
        #[arg(long)]
        name: Option<String>,

        /// Read encryption password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Decrypt a payload or record produced by encrypt-text
    DecryptText {
        /// JSON file to read (stdin if omitted)
        input: Option<PathBuf>,

        /// Read encryption password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Encrypt a file into FILE.encrypted and FILE.encrypted.meta.json
    EncryptFile {
        input: PathBuf,

        /// Output path for the encrypted blob
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read encryption password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Decrypt a file using its metadata
    DecryptFile {
        input: PathBuf,

        /// Metadata file (defaults to INPUT.meta.json)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Expected pairing id of the metadata
        #[arg(long)]
        id: Option<Uuid>,

        /// Output path for the decrypted file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read encryption password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Generate an RSA key pair
    Keygen {
        /// Modulus size in bits (1024, 2048 or 4096)
        #[arg(long)]
        bits: Option<u32>,

        /// Write PREFIX.pem and PREFIX.pub.pem (or the sealed JSON) here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Protect the private key with a password under this name
        #[arg(long)]
        seal: Option<String>,

        /// Read sealing password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Encrypt short text to a public key
    RsaEncrypt {
        /// Public key PEM file
        #[arg(short, long)]
        key: PathBuf,

        text: Option<String>,
    },

    /// Decrypt base64 ciphertext with a private key
    RsaDecrypt {
        /// Private key PEM file
        #[arg(short, long, required_unless_present = "sealed", conflicts_with = "sealed")]
        key: Option<PathBuf>,

        /// Sealed key pair JSON produced by `keygen --seal`
        #[arg(long)]
        sealed: Option<PathBuf>,

        ciphertext: Option<String>,

        /// Read sealing password from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Digest text with SHA-256, SHA-384 or SHA-512
    Hash {
        text: Option<String>,

        /// Algorithm name (defaults to the configured one)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Print hex instead of base64
        #[arg(long)]
        hex: bool,
    },

    /// Generate a raw AES key (base64)
    AesKey {
        /// Key size in bits (128, 192 or 256)
        #[arg(long)]
        bits: Option<u32>,
    },

    /// Generate a random password
    Password {
        #[arg(short, long, default_value_t = random::DEFAULT_PASSWORD_LEN)]
        length: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Expand ~ in config path
    let config_path = cli
        .config
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    // Setup logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = config
        .as_ref()
        .ok()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());
    let writer = match log_file {
        Some(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    // Run the command
    let result = config.and_then(|config| run_command(cli.command, &config_path, &config));
    if let Err(e) = result {
        error!("Error: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn run_command(command: Commands, config_path: &Path, config: &Config) -> Result<()> {
    let engine = Engine::new(config);

    match command {
        Commands::Init { force } => cmd_init(config_path, force),

        Commands::EncryptText {
            text,
            name,
            password_file,
        } => cmd_encrypt_text(&engine, text, name, password_file),

        Commands::DecryptText {
            input,
            password_file,
        } => cmd_decrypt_text(&engine, input, password_file),

        Commands::EncryptFile {
            input,
            output,
            password_file,
        } => cmd_encrypt_file(&engine, &input, output, password_file),

        Commands::DecryptFile {
            input,
            metadata,
            id,
            output,
            password_file,
        } => cmd_decrypt_file(&engine, &input, metadata, id, output, password_file),

        Commands::Keygen {
            bits,
            output,
            seal,
            password_file,
        } => cmd_keygen(&engine, bits, output, seal, password_file),

        Commands::RsaEncrypt { key, text } => cmd_rsa_encrypt(&engine, &key, text),

        Commands::RsaDecrypt {
            key,
            sealed,
            ciphertext,
            password_file,
        } => cmd_rsa_decrypt(&engine, key, sealed, ciphertext, password_file),

        Commands::Hash {
            text,
            algorithm,
            hex,
        } => cmd_hash(&engine, config, text, algorithm, hex),

        Commands::AesKey { bits } => cmd_aes_key(&engine, bits),

        Commands::Password { length } => cmd_password(length),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            config_path
        )));
    }

    let config = Config::default();
    config.save(config_path)?;

    info!("Wrote default configuration to {:?}", config_path);
    println!("Configuration: {:?}", config_path);
    println!("KDF iterations: {}", config.kdf.iterations);
    println!("RSA key size: {} bits", config.asymmetric.key_size.bits());
    println!("Hash algorithm: {}", config.hash.algorithm);

    Ok(())
}

fn cmd_encrypt_text(
    engine: &Engine,
    text: Option<String>,
    name: Option<String>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let text = Zeroizing::new(read_text(text)?);
    let password = read_password(password_file.as_deref(), "Enter encryption password: ")?;

    match name {
        Some(name) => {
            let record = engine.encrypt_text_record(&name, &text, &password)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        None => println!("{}", engine.encrypt_text(&text, &password)?.to_json()?),
    }

    Ok(())
}

fn cmd_decrypt_text(
    engine: &Engine,
    input: Option<PathBuf>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let json = match input {
        Some(path) => std::fs::read_to_string(&path)?,
        None => read_stdin()?,
    };
    let input = parse_text_input(&json)?;
    let password = read_password(password_file.as_deref(), "Enter encryption password: ")?;

    let text = match input {
        TextInput::Record(record) => engine.decrypt_text_record(&record, &password)?,
        TextInput::Payload(payload) => engine.decrypt_text(&payload, &password)?,
    };
    let text = Zeroizing::new(text);
    println!("{}", text.as_str());

    Ok(())
}

fn cmd_encrypt_file(
    engine: &Engine,
    input: &Path,
    output: Option<PathBuf>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let data = std::fs::read(input)?;
    let file_size = data.len() as u64;
    let password = read_password(password_file.as_deref(), "Enter encryption password: ")?;

    info!("Encrypting {:?} ({} bytes)", input, file_size);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal(e.to_string()))?;
    let encrypted = runtime.block_on(async {
        let (handle, progress) = engine.encrypt_file_task(data, password);
        drive(handle, progress).await
    })?;

    let encrypted = encrypted.with_file_info(FileInfo {
        original_file_name: input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        file_size: Some(file_size),
        mime_type: None,
    });

    let blob_path =
        output.unwrap_or_else(|| append_suffix(input, &format!(".{}", ENCRYPTED_EXTENSION)));
    let meta_path = append_suffix(&blob_path, METADATA_SUFFIX);

    std::fs::write(&blob_path, &encrypted.blob)?;
    std::fs::write(&meta_path, encrypted.metadata.to_json()?)?;

    println!("Encrypted: {:?}", blob_path);
    println!("Metadata: {:?}", meta_path);
    println!("Id: {}", encrypted.id());

    Ok(())
}

fn cmd_decrypt_file(
    engine: &Engine,
    input: &Path,
    metadata: Option<PathBuf>,
    id: Option<Uuid>,
    output: Option<PathBuf>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let meta_path = metadata.unwrap_or_else(|| append_suffix(input, METADATA_SUFFIX));
    if !meta_path.exists() {
        return Err(Error::MissingMetadata(format!("{:?}", meta_path)));
    }

    let metadata = FileMetadata::from_json(&std::fs::read_to_string(&meta_path)?)?;
    let id = id.unwrap_or(metadata.id);
    let output = output.unwrap_or_else(|| decrypted_path(input, metadata.file.as_ref()));

    let mut index = MetadataIndex::new();
    index.insert(metadata);

    let blob = std::fs::read(input)?;
    let password = read_password(password_file.as_deref(), "Enter encryption password: ")?;

    let plaintext = Zeroizing::new(engine.decrypt_file_by_id(
        blob.as_slice(),
        &id,
        &index,
        &password,
        |p| debug!("Decrypting: {:.0}%", p * 100.0),
    )?);

    std::fs::write(&output, plaintext.as_slice())?;
    println!("Decrypted: {:?}", output);

    Ok(())
}

fn cmd_keygen(
    engine: &Engine,
    bits: Option<u32>,
    output: Option<PathBuf>,
    seal: Option<String>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let size = bits.map(RsaKeySize::from_bits).transpose()?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal(e.to_string()))?;
    let pair = runtime.block_on(engine.generate_key_pair_async(size))?;

    if let Some(name) = seal {
        let password = read_password(password_file.as_deref(), "Enter sealing password: ")?;
        let sealed = SealedKeyPair::seal(&name, &pair, &password, engine.kdf_params())?;
        let json = serde_json::to_string_pretty(&sealed)?;

        match output {
            Some(path) => {
                std::fs::write(&path, json)?;
                println!("Sealed key pair: {:?}", path);
            }
            None => println!("{}", json),
        }
        return Ok(());
    }

    match output {
        Some(prefix) => {
            let public_path = append_suffix(&prefix, ".pub.pem");
            let private_path = append_suffix(&prefix, ".pem");
            std::fs::write(&public_path, &pair.public_key)?;
            write_private(&private_path, pair.private_key.as_bytes())?;
            println!("Public key: {:?}", public_path);
            println!("Private key: {:?}", private_path);
        }
        None => {
            println!("{}", pair.public_key);
            println!("{}", pair.private_key);
        }
    }

    Ok(())
}

fn cmd_rsa_encrypt(engine: &Engine, key: &Path, text: Option<String>) -> Result<()> {
    let public_pem = std::fs::read_to_string(key)?;
    let text = Zeroizing::new(read_text(text)?);

    println!("{}", engine.rsa_encrypt(&text, &public_pem)?);
    Ok(())
}

fn cmd_rsa_decrypt(
    engine: &Engine,
    key: Option<PathBuf>,
    sealed: Option<PathBuf>,
    ciphertext: Option<String>,
    password_file: Option<PathBuf>,
) -> Result<()> {
    let private_pem = match (key, sealed) {
        (Some(path), _) => Zeroizing::new(std::fs::read_to_string(path)?),
        (None, Some(path)) => {
            let sealed: SealedKeyPair = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            let password = read_password(password_file.as_deref(), "Enter sealing password: ")?;
            let pair = sealed.open(&password, engine.kdf_params())?;
            Zeroizing::new(pair.private_key.clone())
        }
        (None, None) => {
            return Err(Error::KeyFormat(
                "a private key or sealed key pair is required".to_string(),
            ));
        }
    };

    let ciphertext = read_text(ciphertext)?;
    let plaintext = Zeroizing::new(engine.rsa_decrypt(ciphertext.trim(), &private_pem)?);
    println!("{}", plaintext.as_str());

    Ok(())
}

fn cmd_hash(
    engine: &Engine,
    config: &Config,
    text: Option<String>,
    algorithm: Option<String>,
    hex: bool,
) -> Result<()> {
    let text = read_text(text)?;

    let digest = match (algorithm, hex) {
        (Some(name), true) => hash::hash_hex(&text, HashAlgorithm::from_str(&name)?),
        (None, true) => hash::hash_hex(&text, config.hash.algorithm),
        (Some(name), false) => engine.hash_with(&text, &name)?,
        (None, false) => engine.hash(&text),
    };

    println!("{}", digest);
    Ok(())
}

fn cmd_aes_key(engine: &Engine, bits: Option<u32>) -> Result<()> {
    let key = match bits {
        Some(bits) => SymmetricKey::generate(AesKeySize::from_bits(bits)?),
        None => engine.generate_symmetric_key(),
    };

    println!("{}", key.export().as_str());
    Ok(())
}

fn cmd_password(length: usize) -> Result<()> {
    if length == 0 {
        return Err(Error::Internal("password length must be at least 1".to_string()));
    }

    println!("{}", random::generate_password(length).as_str());
    Ok(())
}

/// Await an offloaded file operation, logging its progress
async fn drive<T>(handle: JoinHandle<Result<T>>, mut progress: ProgressReceiver) -> Result<T> {
    while let Some(p) = progress.recv().await {
        debug!("Progress: {:.0}%", p * 100.0);
    }

    handle
        .await
        .map_err(|e| Error::Internal(format!("worker task failed: {}", e)))?
}

enum TextInput {
    Record(EncryptedRecord),
    Payload(EncryptedPayload),
}

/// Accept either a bare payload or a record wrapping one
fn parse_text_input(json: &str) -> Result<TextInput> {
    if let Ok(record) = serde_json::from_str::<EncryptedRecord>(json) {
        return Ok(TextInput::Record(record));
    }
    EncryptedPayload::from_json(json).map(TextInput::Payload)
}

fn read_password(password_file: Option<&Path>, prompt: &str) -> Result<Zeroizing<String>> {
    let password = if let Some(path) = password_file {
        std::fs::read_to_string(path)
            .map_err(|e| Error::Internal(format!("Failed to read password file: {}", e)))?
            .trim()
            .to_string()
    } else {
        rpassword::prompt_password(prompt).map_err(|e| Error::Internal(e.to_string()))?
    };
    Ok(Zeroizing::new(password))
}

fn read_text(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => Ok(read_stdin()?.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// `report.pdf.encrypted` -> `report.pdf`, otherwise the recorded original name
fn decrypted_path(input: &Path, info: Option<&FileInfo>) -> PathBuf {
    if input.extension().is_some_and(|ext| ext == ENCRYPTED_EXTENSION) {
        return input.with_extension("");
    }

    let name = info
        .and_then(|i| i.original_file_name.as_deref())
        .and_then(|n| Path::new(n).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("decrypted"));
    input.parent().map(|dir| dir.join(&name)).unwrap_or(name)
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, contents)?;
    Ok(())
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
