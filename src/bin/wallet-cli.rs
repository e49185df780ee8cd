use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "wallet-cli")]
#[command(about = "Operator CLI for the wallet API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000", env = "WALLET_API_URL")]
    url: String,

    /// User or admin API key, depending on the command.
    #[arg(short, long, env = "WALLET_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show wallet and node status
    Status,
    /// Create a new wallet and print its mnemonic (admin key)
    Init {
        #[arg(long)]
        password: String,
    },
    /// Restore the wallet from a mnemonic (admin key)
    Restore {
        #[arg(long)]
        password: String,
        #[arg(long)]
        mnemonic: String,
    },
    /// Unlock the wallet
    Unlock {
        #[arg(long)]
        password: String,
    },
    /// Lock the wallet
    Lock,
    /// List derived account addresses
    Accounts {
        #[arg(long, default_value_t = 0)]
        page_index: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Fuse QSR for plasma
    Fuse {
        /// Account index to fuse from
        index: u32,
        /// Beneficiary address
        #[arg(long)]
        address: String,
        /// Amount of QSR
        #[arg(long)]
        amount: String,
    },
    /// Send tokens
    Send {
        /// Account index to send from
        index: u32,
        #[arg(long)]
        address: String,
        #[arg(long)]
        amount: String,
        /// Token standard or symbol (ZNN, QSR)
        #[arg(long, default_value = "ZNN")]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)),
        Commands::Init { password } => client
            .post(format!("{}/init", base))
            .json(&json!({ "password": password })),
        Commands::Restore { password, mnemonic } => client
            .post(format!("{}/restore", base))
            .json(&json!({ "password": password, "mnemonic": mnemonic })),
        Commands::Unlock { password } => client
            .post(format!("{}/unlock", base))
            .json(&json!({ "password": password })),
        Commands::Lock => client.post(format!("{}/lock", base)),
        Commands::Accounts { page_index, page_size } => client
            .get(format!("{}/accounts", base))
            .query(&[("pageIndex", page_index), ("pageSize", page_size)]),
        Commands::Fuse { index, address, amount } => client
            .post(format!("{}/{}/fuse", base, index))
            .json(&json!({ "address": address, "amount": amount })),
        Commands::Send { index, address, amount, token } => client
            .post(format!("{}/{}/send", base, index))
            .json(&json!({ "address": address, "amount": amount, "tokenStandard": token })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: wallet API returned status {}", status);
        if !text.is_empty() {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
