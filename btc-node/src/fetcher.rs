//! A prev-tx fetcher backed by a blockstream-style explorer, with an
//! in-memory cache. Plugs into `Transaction::validate` through the core's
//! `TxFetcher` interface.

use std::cell::RefCell;
use std::collections::HashMap;

use log::debug;

use btc_primitives::tx::{Transaction, TxFetcher};
use btc_primitives::{Error, Network, Result, H256};

const MAINNET_API: &str = "https://blockstream.info/api";
const TESTNET_API: &str = "https://blockstream.info/testnet/api";
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct HttpFetcher {
    base_url: String,
    cache: RefCell<HashMap<H256, Transaction>>,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> HttpFetcher {
        HttpFetcher {
            base_url: base_url.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn for_network(network: Network) -> HttpFetcher {
        match network {
            Network::Mainnet => HttpFetcher::new(MAINNET_API),
            Network::Testnet => HttpFetcher::new(TESTNET_API),
        }
    }

    fn fetch_remote(&self, txid: &H256) -> Result<Transaction> {
        let url = format!("{}/tx/{}/hex", self.base_url, txid.to_display_hex());
        debug!(target: "fetcher", "GET {url}");
        let response = minreq::get(&url)
            .with_timeout(REQUEST_TIMEOUT_SECS)
            .send()
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("explorer request failed: {e}"),
                ))
            })?;
        if response.status_code != 200 {
            return Err(Error::Protocol(format!(
                "explorer returned {} for {}",
                response.status_code,
                txid.to_display_hex()
            )));
        }
        let raw = hex::decode(response.as_str().map_err(|e| {
            Error::Parse(format!("explorer response is not text: {e}"))
        })?.trim())
        .map_err(|e| Error::Parse(format!("explorer response is not hex: {e}")))?;

        let tx = Transaction::parse(&mut raw.as_slice())?;
        if tx.hash() != *txid {
            return Err(Error::Crypto(format!(
                "explorer returned {} for requested {}",
                tx.id(),
                txid.to_display_hex()
            )));
        }
        Ok(tx)
    }
}

impl TxFetcher for HttpFetcher {
    fn fetch(&self, txid: &H256) -> Result<Transaction> {
        if let Some(tx) = self.cache.borrow().get(txid) {
            return Ok(tx.clone());
        }
        let tx = self.fetch_remote(txid)?;
        self.cache.borrow_mut().insert(*txid, tx.clone());
        Ok(tx)
    }
}
