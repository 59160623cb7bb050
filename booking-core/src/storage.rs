//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `trains` - Train rows and seat counters (key: train_id)
//! - `users` - Registered users (key: user_id)
//! - `bookings` - Append-only booking ledger (key: booking_id)
//! - `indices` - Unique-name and secondary indices
//!
//! # Index keys
//!
//! - `n` || name -> train_id
//! - `u` || username -> user_id
//! - `r` || len(source) || source || len(destination) || destination || train_id -> empty
//! - `b` || user_id || booking_id -> empty
//! - `t` || train_id || booking_id -> empty
//!
//! All multi-row writes go through [`StorageTxn`], which commits a single
//! `WriteBatch`: every row in it lands, or none does.

use crate::{
    error::{Error, Result},
    types::{BookingEntry, BookingId, Train, TrainId, User, UserId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Column family names
const CF_TRAINS: &str = "trains";
const CF_USERS: &str = "users";
const CF_BOOKINGS: &str = "bookings";
const CF_INDICES: &str = "indices";

const IDX_TRAIN_NAME: u8 = b'n';
const IDX_USERNAME: u8 = b'u';
const IDX_ROUTE: u8 = b'r';
const IDX_USER_BOOKING: u8 = b'b';
const IDX_TRAIN_BOOKING: u8 = b't';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRAINS, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_rows()),
            ColumnFamilyDescriptor::new(CF_BOOKINGS, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB booking store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_rows() -> Options {
        let mut opts = Options::default();
        // Train counters are read on every reservation, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get_row<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Keys in `cf_name` starting with `prefix`, in key order
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Start an atomic write unit
    pub fn begin(&self) -> StorageTxn<'_> {
        StorageTxn {
            storage: self,
            batch: WriteBatch::default(),
        }
    }

    // Train operations

    /// Get train by ID
    pub fn get_train(&self, train_id: TrainId) -> Result<Train> {
        self.get_row(CF_TRAINS, train_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("train {}", train_id)))
    }

    /// Look up a train ID by its unique name
    pub fn train_id_by_name(&self, name: &str) -> Result<Option<TrainId>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, Self::index_key_name(IDX_TRAIN_NAME, name))? {
            Some(value) => Ok(Some(TrainId::from_uuid(uuid_from_slice(&value)?))),
            None => Ok(None),
        }
    }

    /// Trains matching both labels exactly, in creation order
    pub fn trains_on_route(&self, source: &str, destination: &str) -> Result<Vec<Train>> {
        let prefix = Self::index_prefix_route(source, destination);
        let keys = self.scan_prefix(CF_INDICES, &prefix)?;

        let mut trains = Vec::with_capacity(keys.len());
        for key in keys {
            let train_id = TrainId::from_uuid(trailing_uuid(&key, prefix.len())?);
            trains.push(self.get_train(train_id)?);
        }
        Ok(trains)
    }

    /// Every train, in creation order
    pub fn all_trains(&self) -> Result<Vec<Train>> {
        let cf = self.cf_handle(CF_TRAINS)?;
        let mut trains = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            trains.push(bincode::deserialize(&value)?);
        }
        Ok(trains)
    }

    // User operations

    /// Get user by ID
    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        self.get_row(CF_USERS, user_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Look up a user ID by username
    pub fn user_id_by_username(&self, username: &str) -> Result<Option<UserId>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, Self::index_key_name(IDX_USERNAME, username))? {
            Some(value) => Ok(Some(UserId::from_uuid(uuid_from_slice(&value)?))),
            None => Ok(None),
        }
    }

    // Booking operations

    /// Get booking by ID
    pub fn get_booking(&self, booking_id: BookingId) -> Result<BookingEntry> {
        self.get_row(CF_BOOKINGS, booking_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("booking {}", booking_id)))
    }

    /// Bookings made by a user (via index)
    pub fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<BookingEntry>> {
        self.bookings_by_index(&Self::index_prefix_id(IDX_USER_BOOKING, user_id.as_bytes()))
    }

    /// Bookings made on a train (via index)
    pub fn bookings_for_train(&self, train_id: TrainId) -> Result<Vec<BookingEntry>> {
        self.bookings_by_index(&Self::index_prefix_id(IDX_TRAIN_BOOKING, train_id.as_bytes()))
    }

    fn bookings_by_index(&self, prefix: &[u8]) -> Result<Vec<BookingEntry>> {
        let keys = self.scan_prefix(CF_INDICES, prefix)?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let booking_id = BookingId::from_uuid(trailing_uuid(&key, prefix.len())?);
            entries.push(self.get_booking(booking_id)?);
        }
        Ok(entries)
    }

    // Index key helpers

    fn index_key_name(tag: u8, name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + name.len());
        key.push(tag);
        key.extend_from_slice(name.as_bytes());
        key
    }

    fn index_prefix_route(source: &str, destination: &str) -> Vec<u8> {
        let mut key = vec![IDX_ROUTE];
        for label in [source, destination] {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart
            key.extend_from_slice(&(label.len() as u32).to_be_bytes());
            key.extend_from_slice(label.as_bytes());
        }
        key
    }

    fn index_prefix_id(tag: u8, id: &[u8; 16]) -> Vec<u8> {
        let mut key = Vec::with_capacity(33);
        key.push(tag);
        key.extend_from_slice(id);
        key
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_trains: self.approximate_count(self.cf_handle(CF_TRAINS)?)?,
            total_users: self.approximate_count(self.cf_handle(CF_USERS)?)?,
            total_bookings: self.approximate_count(self.cf_handle(CF_BOOKINGS)?)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// One atomic write unit
///
/// Rows are staged in memory and applied by [`StorageTxn::commit`] in a single
/// RocksDB write. Dropping the transaction without committing discards it.
pub struct StorageTxn<'a> {
    storage: &'a Storage,
    batch: WriteBatch,
}

impl<'a> StorageTxn<'a> {
    /// Stage a brand-new train with its name and route indices
    pub fn insert_train(&mut self, train: &Train) -> Result<()> {
        self.put_train(train)?;

        let cf_indices = self.storage.cf_handle(CF_INDICES)?;
        self.batch.put_cf(
            cf_indices,
            Storage::index_key_name(IDX_TRAIN_NAME, &train.name),
            train.id.as_bytes(),
        );

        let mut route_key = Storage::index_prefix_route(&train.source, &train.destination);
        route_key.extend_from_slice(train.id.as_bytes());
        self.batch.put_cf(cf_indices, route_key, b"");

        Ok(())
    }

    /// Stage an updated train row
    pub fn put_train(&mut self, train: &Train) -> Result<()> {
        let cf = self.storage.cf_handle(CF_TRAINS)?;
        let value = bincode::serialize(train)?;
        self.batch.put_cf(cf, train.id.as_bytes(), value);
        Ok(())
    }

    /// Stage a new user with its username index
    pub fn insert_user(&mut self, user: &User) -> Result<()> {
        let cf_users = self.storage.cf_handle(CF_USERS)?;
        let value = bincode::serialize(user)?;
        self.batch.put_cf(cf_users, user.id.as_bytes(), value);

        let cf_indices = self.storage.cf_handle(CF_INDICES)?;
        self.batch.put_cf(
            cf_indices,
            Storage::index_key_name(IDX_USERNAME, &user.username),
            user.id.as_bytes(),
        );
        Ok(())
    }

    /// Stage a ledger entry with its user and train indices
    pub fn append_booking(&mut self, entry: &BookingEntry) -> Result<()> {
        let cf_bookings = self.storage.cf_handle(CF_BOOKINGS)?;
        let value = bincode::serialize(entry)?;
        self.batch.put_cf(cf_bookings, entry.id.as_bytes(), value);

        let cf_indices = self.storage.cf_handle(CF_INDICES)?;

        let mut by_user = Storage::index_prefix_id(IDX_USER_BOOKING, entry.user_id.as_bytes());
        by_user.extend_from_slice(entry.id.as_bytes());
        self.batch.put_cf(cf_indices, by_user, b"");

        let mut by_train = Storage::index_prefix_id(IDX_TRAIN_BOOKING, entry.train_id.as_bytes());
        by_train.extend_from_slice(entry.id.as_bytes());
        self.batch.put_cf(cf_indices, by_train, b"");

        Ok(())
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Atomic commit; an empty transaction writes nothing
    pub fn commit(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.storage.write(self.batch)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate train count
    pub total_trains: u64,
    /// Approximate user count
    pub total_users: u64,
    /// Approximate ledger size
    pub total_bookings: u64,
}

fn uuid_from_slice(bytes: &[u8]) -> Result<uuid::Uuid> {
    uuid::Uuid::from_slice(bytes).map_err(|e| Error::Storage(format!("corrupt id: {}", e)))
}

fn trailing_uuid(key: &[u8], prefix_len: usize) -> Result<uuid::Uuid> {
    match key.get(prefix_len..) {
        Some(rest) if rest.len() == 16 => uuid_from_slice(rest),
        _ => Err(Error::Storage(format!(
            "malformed index key of {} bytes",
            key.len()
        ))),
    }
}
