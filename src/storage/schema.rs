//! SQL schema for the liquor sales database.
//!
//! `CREATE_SCHEMA` is idempotent thanks to `IF NOT EXISTS`; a full rebuild runs
//! `DROP_SCHEMA` first. Foreign keys are declared but not enforced during the load,
//! since transactions are flushed before the entity tables are written.

/// Connection-level settings for a bulk load.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = OFF;
";

pub const DROP_SCHEMA: &str = "
DROP TABLE IF EXISTS stores_items;
DROP TABLE IF EXISTS \"Transaction\";
DROP TABLE IF EXISTS Store;
DROP TABLE IF EXISTS Item;
";

pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Item (
    number          INTEGER PRIMARY KEY,
    bottle_volume   REAL,              -- milliliters
    category        TEXT,
    category_name   TEXT,
    description     TEXT,
    pack            INTEGER,
    vendor_name     TEXT,
    vendor_number   INTEGER
);

CREATE TABLE IF NOT EXISTS Store (
    number          INTEGER PRIMARY KEY,
    address         TEXT,
    city            TEXT,
    county          TEXT,
    county_number   INTEGER,           -- NULL when the source omits it
    location        TEXT,              -- raw text, usually same as address
    longitude       REAL,
    latitude        REAL,
    name            TEXT,
    zip_code        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS \"Transaction\" (
    number          TEXT PRIMARY KEY,  -- Invoice/Item Number
    bottle_cost     REAL,
    bottle_retail   REAL,
    bottles_sold    INTEGER,
    date            TEXT NOT NULL,     -- YYYY-MM-DD
    gallons_sold    REAL,
    liters_sold     REAL,
    total_sale      REAL,              -- dollars
    item_number     INTEGER NOT NULL REFERENCES Item(number),
    store_number    INTEGER NOT NULL REFERENCES Store(number)
);

CREATE TABLE IF NOT EXISTS stores_items (
    transaction_number  TEXT    NOT NULL REFERENCES \"Transaction\"(number),
    store_number        INTEGER NOT NULL REFERENCES Store(number),
    item_number         INTEGER NOT NULL REFERENCES Item(number),
    PRIMARY KEY (transaction_number, store_number, item_number)
);

CREATE INDEX IF NOT EXISTS item_category_idx        ON Item(category);
CREATE INDEX IF NOT EXISTS item_vendor_number_idx   ON Item(vendor_number);
CREATE INDEX IF NOT EXISTS store_city_idx           ON Store(city);
CREATE INDEX IF NOT EXISTS store_county_number_idx  ON Store(county_number);
CREATE INDEX IF NOT EXISTS store_zip_code_idx       ON Store(zip_code);
CREATE INDEX IF NOT EXISTS transaction_date_idx     ON \"Transaction\"(date);
CREATE INDEX IF NOT EXISTS transaction_item_idx     ON \"Transaction\"(item_number);
CREATE INDEX IF NOT EXISTS transaction_store_idx    ON \"Transaction\"(store_number);
CREATE INDEX IF NOT EXISTS stores_items_store_idx   ON stores_items(store_number);
CREATE INDEX IF NOT EXISTS stores_items_item_idx    ON stores_items(item_number);
";

pub const INSERT_ITEM: &str = "
INSERT OR REPLACE INTO Item (
    number, bottle_volume, category, category_name, description,
    pack, vendor_name, vendor_number
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub const INSERT_STORE: &str = "
INSERT OR REPLACE INTO Store (
    number, address, city, county, county_number,
    location, longitude, latitude, name, zip_code
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

/// Duplicate transaction numbers are ignored here and counted by the caller.
pub const INSERT_TRANSACTION: &str = "
INSERT INTO \"Transaction\" (
    number, bottle_cost, bottle_retail, bottles_sold, date,
    gallons_sold, liters_sold, total_sale, item_number, store_number
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(number) DO NOTHING";

/// Only a repeated composite key is ignored; any other constraint failure aborts the batch.
pub const INSERT_ASSOCIATION: &str = "
INSERT INTO stores_items (transaction_number, store_number, item_number)
VALUES (?1, ?2, ?3)
ON CONFLICT(transaction_number, store_number, item_number) DO NOTHING";

/// Rowids of `stores_items` rows whose keys name no written parent row.
pub const DANGLING_ASSOCIATIONS: &str = "PRAGMA foreign_key_check(stores_items)";
