use clap::Parser;

/// LedgerQL: query ledger accounts, blocks and transactions through a
/// JSON-RPC node, with nested account references resolved for you.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// JSON-RPC node URL.
    #[arg(long, default_value = "http://127.0.0.1:8899", env = "LEDGERQL_RPC_URL")]
    pub rpc_url: String,

    /// RPC basic-auth username (optional; not needed for token-in-URL providers).
    #[arg(long, env = "LEDGERQL_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC basic-auth password.
    #[arg(long, env = "LEDGERQL_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Maximum outbound RPC requests per second (unlimited when omitted).
    #[arg(long, env = "LEDGERQL_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// Address to bind the server to.
    #[arg(long, default_value = "127.0.0.1", env = "LEDGERQL_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3080", env = "LEDGERQL_PORT")]
    pub port: u16,

    /// Resolution cache capacity in entries.
    #[arg(long, default_value = "1024", env = "LEDGERQL_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Share one resolution cache across all requests instead of one per request.
    #[arg(long, env = "LEDGERQL_SHARED_CACHE")]
    pub shared_cache: bool,

    /// Cache `null` node answers (not-found) as well as found entities.
    #[arg(long, env = "LEDGERQL_CACHE_NOT_FOUND")]
    pub cache_not_found: bool,

    /// Maximum nesting depth of `expand` selections.
    #[arg(long, default_value = "4", env = "LEDGERQL_MAX_EXPAND_DEPTH")]
    pub max_expand_depth: usize,

    /// Maximum number of fields in one `expand` selection.
    #[arg(long, default_value = "64", env = "LEDGERQL_MAX_EXPAND_FIELDS")]
    pub max_expand_fields: usize,

    /// Serve the `block` and `transaction` query fields.
    #[arg(long, env = "LEDGERQL_ENABLE_BLOCK_QUERIES")]
    pub enable_block_queries: bool,
}
