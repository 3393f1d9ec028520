use std::sync::Once;
use std::sync::atomic::{AtomicU32, Ordering};

use config::PostgresConfig;
use sqlx::{AssertSqlSafe, Connection, PgConnection};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use tracing_subscriber::EnvFilter;

const PG_USER: &str = "alias_test";
const PG_PASSWORD: &str = "alias_test";
const PG_DATABASE: &str = "aliases";

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Process-unique identifier, usable as a database name or key prefix.
pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}", prefix, std::process::id(), id)
}

static TRACING: Once = Once::new();

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
            )
            .with_test_writer()
            .try_init();
    });
}

/// Start `image` and read its mapped `port`, or `None` (logged) when Docker
/// is unavailable.
async fn start_container<I: Image>(
    image: I,
    port: u16,
    name: &str
) -> Option<(ContainerAsync<I>, u16)> {
    let container = match image.start().await {
        Ok(container) => container,
        Err(e) => {
            tracing::warn!("Failed to start {} container: {:?}", name, e);
            return None;
        }
    };
    match container.get_host_port_ipv4(port).await {
        Ok(host_port) => {
            tracing::info!("{} fixture started on port {}", name, host_port);
            Some((container, host_port))
        }
        Err(e) => {
            tracing::warn!("Failed to map {} port: {:?}", name, e);
            None
        }
    }
}

/// A PostgreSQL server shared by every test in the process.
pub struct PostgresFixture {
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    port: u16
}

impl PostgresFixture {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection settings for `database` on the shared server.
    pub fn config_for(&self, database: &str) -> PostgresConfig {
        PostgresConfig {
            host: "localhost".to_string(),
            port: self.port,
            database: database.to_string(),
            username: PG_USER.to_string(),
            password: PG_PASSWORD.to_string(),
            pool_size: 2,
            timeout_seconds: 10
        }
    }

    /// Create an empty database and return settings pointing at it.
    ///
    /// Every test gets its own `url_alias` table this way, including tests
    /// that need the table to be missing.
    pub async fn fresh_database(&self) -> Result<PostgresConfig, sqlx::Error> {
        let name = unique_id("aliases");
        let admin = self.config_for(PG_DATABASE);
        let mut conn = PgConnection::connect(&admin.connection_url()).await?;
        let statement = format!("CREATE DATABASE {}", name);
        sqlx::query(AssertSqlSafe(statement.as_str()))
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(self.config_for(&name))
    }
}

static POSTGRES: OnceCell<Option<PostgresFixture>> = OnceCell::const_new();

pub async fn postgres() -> Option<&'static PostgresFixture> {
    POSTGRES
        .get_or_init(|| async {
            let image = Postgres::default()
                .with_db_name(PG_DATABASE)
                .with_user(PG_USER)
                .with_password(PG_PASSWORD);
            let (container, port) = start_container(image, 5432, "PostgreSQL").await?;
            Some(PostgresFixture { container, port })
        })
        .await
        .as_ref()
}

/// A Redis server shared by every test in the process.
pub struct RedisFixture {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    url: String
}

impl RedisFixture {
    pub fn url(&self) -> &str {
        &self.url
    }
}

static REDIS: OnceCell<Option<RedisFixture>> = OnceCell::const_new();

pub async fn redis() -> Option<&'static RedisFixture> {
    REDIS
        .get_or_init(|| async {
            let (container, port) = start_container(Redis::default(), 6379, "Redis").await?;
            let url = format!("redis://localhost:{}", port);
            if let Err(e) = ping_redis(&url).await {
                tracing::warn!("Redis fixture is not answering: {:?}", e);
                return None;
            }
            Some(RedisFixture { container, url })
        })
        .await
        .as_ref()
}

async fn ping_redis(url: &str) -> Result<(), redis::RedisError> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
}
