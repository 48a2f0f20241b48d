//! Database repositories for the quote tables.
//!
//! Each repository provides typed access to one table with batch upserts
//! and the queries the pipeline needs.

pub mod company_repo;
pub mod day_stock_repo;
pub mod file_done_repo;
pub mod stock_repo;
pub mod symbol_stats_repo;

pub use company_repo::CompanyRepository;
pub use day_stock_repo::DayStockRepository;
pub use file_done_repo::FileDoneRepository;
pub use stock_repo::StockRepository;
pub use symbol_stats_repo::SymbolStatsRepository;

use sqlx::PgPool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub companies: CompanyRepository,
    pub day_stocks: DayStockRepository,
    pub stocks: StockRepository,
    pub files: FileDoneRepository,
    pub symbol_stats: SymbolStatsRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            companies: CompanyRepository::new(pool.clone()),
            day_stocks: DayStockRepository::new(pool.clone()),
            stocks: StockRepository::new(pool.clone()),
            files: FileDoneRepository::new(pool.clone()),
            symbol_stats: SymbolStatsRepository::new(pool),
        }
    }
}
