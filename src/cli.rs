// CLI commands

use crate::config::NodeConfig;
use crate::consensus::CancelFlag;
use crate::core::{Address, Amount, Block, Transaction, TransactionKind, now_millis};
use crate::ledger::LocatedTransaction;
use crate::network::Node;
use crate::wallet::Keystore;
use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fund-ledger")]
#[command(about = "Hash-chained contribution ledger node", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Proof-of-work difficulty in leading zero hex digits
    #[arg(long, global = true)]
    pub difficulty: Option<u32>,
}

impl ConfigOverrides {
    /// Config file (or defaults) with command-line flags applied on top
    pub fn load(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)?,
            None => NodeConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and genesis block
    Init,

    /// Show ledger info
    Info,

    /// Wallet commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Sign a transaction and add it to the pending pool
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount, up to 8 decimal places
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "transfer")]
        kind: TransactionKind,
        /// Campaign the transaction belongs to
        #[arg(long)]
        campaign: Option<String>,
        /// Sending address (uses default if not specified)
        #[arg(long)]
        from: Option<String>,
    },

    /// Mine a block sealing the pending pool (Ctrl-C cancels)
    Mine,

    /// Chain commands
    #[command(subcommand)]
    Chain(ChainCommands),

    /// Peer commands
    #[command(subcommand)]
    Nodes(NodeCommands),
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new address
    NewAddress,

    /// List all addresses
    List,
}

#[derive(Subcommand)]
pub enum ChainCommands {
    /// Print every block
    Show,

    /// Check hash links and proofs of the local chain
    Validate,

    /// Look up a sealed transaction by its receipt hash
    Tx { hash: String },

    /// Sealed transactions sent or received by an address
    History { address: String },
}

#[derive(Subcommand)]
pub enum NodeCommands {
    /// List configured peers
    List {
        /// Extra peer URLs
        #[arg(long = "peer")]
        peers: Vec<String>,
    },

    /// Adopt the longest valid chain among the peers
    Resolve {
        /// Extra peer URLs
        #[arg(long = "peer")]
        peers: Vec<String>,
    },
}

/// CLI handler
pub struct CliHandler {
    config: NodeConfig,
    node: Node,
    keystore: Keystore,
    keystore_path: PathBuf,
}

impl CliHandler {
    /// Open the node and keystore under the configured data directory
    pub async fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let node = Node::open(&config)
            .await
            .with_context(|| format!("failed to open ledger in {}", config.data_dir.display()))?;

        let keystore_path = config.keystore_path();
        let keystore = Keystore::open(&keystore_path)?;

        Ok(Self {
            config,
            node,
            keystore,
            keystore_path,
        })
    }

    fn save_keystore(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.data_dir)
            .with_context(|| format!("failed to create {}", self.config.data_dir.display()))?;
        self.keystore.save(&self.keystore_path)?;
        Ok(())
    }

    /// Handle CLI command
    pub async fn handle(&mut self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Init => self.init().await,
            Commands::Info => self.info().await,
            Commands::Wallet(cmd) => self.handle_wallet(cmd),
            Commands::Send {
                to,
                amount,
                kind,
                campaign,
                from,
            } => self.send(to, amount, kind, campaign, from).await,
            Commands::Mine => self.mine().await,
            Commands::Chain(cmd) => self.handle_chain(cmd).await,
            Commands::Nodes(cmd) => self.handle_nodes(cmd).await,
        }
    }

    async fn init(&self) -> anyhow::Result<()> {
        let ledger = self.node.ledger();
        let ledger = ledger.read().await;
        let genesis = ledger.chain().first().ok_or_else(|| anyhow!("chain is empty"))?;

        println!("✓ Ledger ready in {}", self.config.data_dir.display());
        println!("  Genesis: {}", genesis.hash_hex());
        println!("  Blocks: {}", ledger.len());
        Ok(())
    }

    async fn info(&self) -> anyhow::Result<()> {
        let ledger = self.node.ledger();
        let ledger = ledger.read().await;
        let tip = ledger.last_block()?;

        println!("Ledger Info:");
        println!("  Blocks: {}", ledger.len());
        println!("  Tip: {}", tip.hash_hex());
        println!("  Pending transactions: {}", ledger.pending().len());
        println!("  Difficulty: {}", self.node.pow().difficulty());
        println!("  Validation: {:?}", self.node.resolver().validator().mode());
        println!("  Peers: {}", self.node.resolver().peers().await.len());
        println!("  Addresses: {}", self.keystore.len());
        Ok(())
    }

    fn handle_wallet(&mut self, cmd: WalletCommands) -> anyhow::Result<()> {
        match cmd {
            WalletCommands::NewAddress => {
                let addr = self.keystore.create_identity();
                self.save_keystore()?;
                println!("New address: {}", addr);
            }
            WalletCommands::List => {
                let default = self.keystore.default_address();
                println!("Addresses ({}):", self.keystore.len());
                for addr in self.keystore.addresses() {
                    let marker = if Some(addr) == default { " (default)" } else { "" };
                    println!("  {}{}", addr, marker);
                }
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        to: String,
        amount: Amount,
        kind: TransactionKind,
        campaign: Option<String>,
        from: Option<String>,
    ) -> anyhow::Result<()> {
        let from = match from {
            Some(a) => a,
            None => self
                .keystore
                .default_address()
                .ok_or_else(|| anyhow!("No default address. Create one with 'wallet new-address'"))?
                .to_string(),
        };
        let keypair = self
            .keystore
            .identity(&from)
            .ok_or_else(|| anyhow!("address {} is not in the keystore", from.trim()))?;

        let mut tx = Transaction::new(
            keypair.address.clone(),
            Address::new(to.trim()),
            amount,
            kind,
            now_millis(),
        );
        if let Some(campaign) = campaign {
            tx = tx.with_campaign(campaign);
        }
        keypair.sign(&mut tx);

        let index = self.node.submit_transaction(tx.clone(), &keypair.public_key).await?;
        println!("Transaction queued for block {}", index);
        println!("  {} -> {}: {} ({})", tx.sender, tx.recipient, tx.amount, tx.kind);
        Ok(())
    }

    async fn mine(&self) -> anyhow::Result<()> {
        let cancel = CancelFlag::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        println!("Mining at difficulty {}...", self.node.pow().difficulty());
        let result = self.node.mine(&cancel).await;
        watcher.abort();
        let sealed = result?;

        println!("✓ Block {} sealed", sealed.block.index);
        println!("  Hash: {}", sealed.block.hash_hex());
        println!("  Proof: {}", sealed.block.proof);
        println!("  Transactions: {}", sealed.block.transactions.len());
        println!(
            "  Attempts: {} in {:.2?} ({:.1} KH/s)",
            sealed.mining.attempts,
            sealed.mining.duration,
            sealed.mining.hash_rate() / 1000.0
        );
        Ok(())
    }

    async fn handle_chain(&self, cmd: ChainCommands) -> anyhow::Result<()> {
        let ledger = self.node.ledger();
        let ledger = ledger.read().await;

        match cmd {
            ChainCommands::Show => {
                for block in ledger.chain() {
                    print_block(block);
                }
            }
            ChainCommands::Validate => {
                match self.node.resolver().validator().validate(ledger.chain()) {
                    Ok(()) => println!("✓ Chain of {} blocks is valid", ledger.len()),
                    Err(e) => bail!("chain is invalid: {}", e),
                }
            }
            ChainCommands::Tx { hash } => {
                let located = ledger
                    .find_transaction(&hash)
                    .ok_or_else(|| anyhow!("Transaction not found: {}", hash))?;
                print_located(&located);
            }
            ChainCommands::History { address } => {
                let history = ledger.transactions_for(&address);
                println!("Transactions for {} ({}):", address.trim(), history.len());
                for located in &history {
                    print_located(located);
                }
            }
        }
        Ok(())
    }

    async fn handle_nodes(&self, cmd: NodeCommands) -> anyhow::Result<()> {
        match cmd {
            NodeCommands::List { peers } => {
                self.node.resolver().register_peers(&peers).await?;
                let hosts = self.node.resolver().peers().await;
                println!("Peers ({}):", hosts.len());
                for host in hosts {
                    println!("  {}", host);
                }
            }
            NodeCommands::Resolve { peers } => {
                self.node.resolver().register_peers(&peers).await?;
                let outcome = self.node.resolve().await?;

                if let Some(source) = &outcome.source {
                    println!("✓ Chain replaced with {} blocks from {}", outcome.chain_length, source);
                } else {
                    println!("Local chain of {} blocks is authoritative", outcome.chain_length);
                }
                for host in &outcome.failed_peers {
                    println!("  unreachable: {}", host);
                }
            }
        }
        Ok(())
    }
}

fn print_block(block: &Block) {
    println!("Block {}:", block.index);
    println!("  Hash: {}", block.hash_hex());
    println!("  Previous: {}", block.previous_hash);
    println!("  Timestamp: {}", block.timestamp);
    println!("  Proof: {}", block.proof);
    println!("  Transactions: {}", block.transactions.len());

    for (i, tx) in block.transactions.iter().enumerate() {
        println!("    [{}] {} -> {}: {} ({})", i, tx.sender, tx.recipient, tx.amount, tx.kind);
    }
}

fn print_located(located: &LocatedTransaction) {
    let tx = &located.transaction;
    println!("Transaction {}:", located.transaction_hash);
    println!("  Block: {} (previous {})", located.block_index, located.block_previous_hash);
    println!("  {} -> {}: {} ({})", tx.sender, tx.recipient, tx.amount, tx.kind);
    println!("  Signed: {}", if tx.is_signed() { "yes" } else { "no" });
    if let Some(campaign) = &tx.campaign_ref {
        println!("  Campaign: {}", campaign);
    }
}
