#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;
use uuid::Uuid;

use engine::{AccountRole, Engine, MintCmd};
use migration::MigratorTrait;

/// A classroom with one account per role.
pub struct Fixture {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub classroom: Uuid,
    pub teacher: Uuid,
    pub banker: Uuid,
    pub mart: Uuid,
    pub alice: Uuid,
    pub bob: Uuid,
}

impl Fixture {
    /// Mints `amount` into `account` through the banker.
    pub async fn fund(&self, account: Uuid, amount: i64) {
        self.engine
            .mint(MintCmd::new(self.classroom, self.banker, account, amount))
            .await
            .unwrap();
    }

    pub async fn balance(&self, account: Uuid) -> i64 {
        self.engine.balance(self.classroom, account).await.unwrap()
    }

    /// Asserts the ledger replays to the stored balances and escrows cover
    /// their open positions.
    pub async fn assert_consistent(&self) {
        let report = self
            .engine
            .verify_scope_balances(self.classroom)
            .await
            .unwrap();
        assert!(report.is_consistent(), "{report:?}");
    }
}

async fn engine_on(db: DatabaseConnection) -> (Engine, DatabaseConnection) {
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    engine_on(db).await
}

pub async fn fixture() -> Fixture {
    let (engine, db) = engine_with_db().await;
    provision(engine, db).await
}

/// Same classroom on a sqlite file with a pool of connections, so
/// transactions really run side by side. Keep the `TempDir` alive.
pub async fn file_fixture() -> (Fixture, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("classbank.db").display()
    );
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    let (engine, db) = engine_on(db).await;
    (provision(engine, db).await, dir)
}

async fn provision(engine: Engine, db: DatabaseConnection) -> Fixture {
    let classroom = engine.new_classroom("5B", "ms-rossi").await.unwrap();
    let teacher = engine.treasury(classroom.id).await.unwrap().id;
    let banker = engine
        .open_account(classroom.id, "banker", "Bank", AccountRole::Banker)
        .await
        .unwrap()
        .id;
    let mart = engine
        .open_account(classroom.id, "mart", "Mart", AccountRole::Mart)
        .await
        .unwrap()
        .id;
    let alice = engine
        .open_account(classroom.id, "alice", "Alice", AccountRole::Student)
        .await
        .unwrap()
        .id;
    let bob = engine
        .open_account(classroom.id, "bob", "Bob", AccountRole::Student)
        .await
        .unwrap()
        .id;

    Fixture {
        engine,
        db,
        classroom: classroom.id,
        teacher,
        banker,
        mart,
        alice,
        bob,
    }
}
