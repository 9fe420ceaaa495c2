//! An append-only, in-memory header chain that validates as it grows:
//! linkage, proof of work, and the retarget schedule.

use log::debug;

use btc_primitives::block::{retarget_bits, Header, Work, BLOCKS_PER_ADJUSTMENT};
use btc_primitives::{Error, Network, Result, H256};

/// A validated chain of headers rooted at the network's genesis block.
pub struct HeaderChain {
    network: Network,
    headers: Vec<Header>,
    tip_hash: H256,
    chain_work: Work,
    /// Timestamp of the first block of the current difficulty epoch.
    epoch_first_timestamp: u32,
    /// Accept headers whose hash misses their target; for tests over
    /// synthetic chains, never for real sync.
    skip_pow_verification: bool,
}

impl HeaderChain {
    pub fn new(network: Network) -> HeaderChain {
        Self::with_options(network, false)
    }

    pub fn with_options(network: Network, skip_pow_verification: bool) -> HeaderChain {
        let genesis = network.genesis_header();
        HeaderChain {
            network,
            tip_hash: genesis.hash(),
            chain_work: genesis.work(),
            epoch_first_timestamp: genesis.timestamp,
            headers: vec![genesis],
            skip_pow_verification,
        }
    }

    /// Height of the tip; genesis is height 0.
    pub fn height(&self) -> u64 {
        self.headers.len() as u64 - 1
    }

    pub fn tip(&self) -> &Header {
        self.headers.last().expect("chain always holds genesis")
    }

    pub fn tip_hash(&self) -> H256 {
        self.tip_hash
    }

    pub fn chain_work(&self) -> Work {
        self.chain_work
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Validates and appends one header. Checks, in order: linkage to the
    /// current tip, proof of work, and the expected bits — equality inside
    /// an epoch, the computed retarget at each 2016-block boundary.
    /// Testnet's min-difficulty rule makes its bits sequence unpredictable
    /// from headers alone, so the bits checks apply to mainnet only.
    pub fn append(&mut self, header: Header) -> Result<()> {
        let height = self.height() + 1;

        if header.prev_block != self.tip_hash {
            return Err(Error::Protocol(format!(
                "header at height {height} does not extend the tip: prev {}, tip {}",
                header.prev_block.to_display_hex(),
                self.tip_hash.to_display_hex()
            )));
        }

        if !self.skip_pow_verification && !header.check_pow() {
            return Err(Error::Crypto(format!(
                "proof of work failed at height {height}: {}",
                header.id()
            )));
        }

        let boundary = height % BLOCKS_PER_ADJUSTMENT == 0;
        if boundary {
            if !self.network.allows_min_difficulty() {
                let expected = retarget_bits(
                    self.tip().bits,
                    self.epoch_first_timestamp,
                    self.tip().timestamp,
                    self.network.pow_limit(),
                )?;
                if header.bits != expected {
                    return Err(Error::Crypto(format!(
                        "wrong retarget at height {height}: bits 0x{:08x}, expected 0x{expected:08x}",
                        header.bits
                    )));
                }
            }
            debug!(
                target: "chain",
                "retarget at height {height}: bits 0x{:08x}",
                header.bits
            );
            self.epoch_first_timestamp = header.timestamp;
        } else if !self.network.allows_min_difficulty() && header.bits != self.tip().bits {
            return Err(Error::Crypto(format!(
                "bits changed mid-epoch at height {height}: 0x{:08x} after 0x{:08x}",
                header.bits,
                self.tip().bits
            )));
        }

        self.tip_hash = header.hash();
        self.chain_work = self.chain_work.wrapping_add(header.work());
        self.headers.push(header);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btc_primitives::block::TARGET_TIMESPAN_SECS;

    /// A header extending `chain`'s tip; nothing about it is mined, so
    /// tests using it skip proof of work.
    fn next_header(chain: &HeaderChain, bits: u32, spacing: u32) -> Header {
        let tip = chain.tip();
        Header {
            version: 0x2000_0000,
            prev_block: chain.tip_hash(),
            merkle_root: H256::ZERO,
            timestamp: tip.timestamp + spacing,
            bits,
            nonce: 0,
        }
    }

    #[test]
    fn starts_at_genesis() {
        let chain = HeaderChain::new(Network::Mainnet);
        assert_eq!(chain.height(), 0);
        assert_eq!(
            chain.tip_hash().to_display_hex(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(chain.tip().prev_block, H256::ZERO);
    }

    #[test]
    fn rejects_unlinked_headers() {
        let mut chain = HeaderChain::with_options(Network::Mainnet, true);
        let mut header = next_header(&chain, chain.tip().bits, 600);
        header.prev_block = H256([0x42; 32]);
        assert!(matches!(chain.append(header), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_failed_pow_when_not_skipping() {
        let mut chain = HeaderChain::new(Network::Mainnet);
        // An unmined header at real difficulty cannot meet its target.
        let header = next_header(&chain, chain.tip().bits, 600);
        assert!(matches!(chain.append(header), Err(Error::Crypto(_))));
    }

    #[test]
    fn rejects_mid_epoch_bits_change() {
        let mut chain = HeaderChain::with_options(Network::Mainnet, true);
        let bits = chain.tip().bits;
        chain.append(next_header(&chain, bits, 600)).unwrap();
        let changed = next_header(&chain, bits - 1, 600);
        assert!(matches!(chain.append(changed), Err(Error::Crypto(_))));
    }

    #[test]
    fn accepts_and_checks_the_first_retarget() {
        let mut chain = HeaderChain::with_options(Network::Mainnet, true);
        let bits = chain.tip().bits;

        // Fill the first epoch at a plausible cadence.
        for _ in 1..BLOCKS_PER_ADJUSTMENT {
            chain.append(next_header(&chain, bits, 600)).unwrap();
        }
        assert_eq!(chain.height(), BLOCKS_PER_ADJUSTMENT - 1);

        // 2015 spacings of 600s measure just under the full timespan, so
        // the boundary bits must be the recomputed value, and the old bits
        // must be refused.
        let expected = retarget_bits(
            bits,
            chain.headers()[0].timestamp,
            chain.tip().timestamp,
            Network::Mainnet.pow_limit(),
        )
        .unwrap();

        let stale = next_header(&chain, bits, 600);
        // The genesis-difficulty epoch retargets back to the limit; use a
        // faster epoch if this ever ties.
        if expected != bits {
            assert!(matches!(chain.append(stale), Err(Error::Crypto(_))));
        }

        let boundary = next_header(&chain, expected, 600);
        chain.append(boundary).unwrap();
        assert_eq!(chain.height(), BLOCKS_PER_ADJUSTMENT);
    }

    #[test]
    fn fast_epoch_retargets_harder() {
        let mut chain = HeaderChain::with_options(Network::Mainnet, true);
        let bits = chain.tip().bits;

        // One-second spacing: the epoch closes 2015 seconds after genesis,
        // clamping the timespan at a quarter.
        for _ in 1..BLOCKS_PER_ADJUSTMENT {
            chain.append(next_header(&chain, bits, 1)).unwrap();
        }
        let expected = retarget_bits(
            bits,
            chain.headers()[0].timestamp,
            chain.tip().timestamp,
            Network::Mainnet.pow_limit(),
        )
        .unwrap();
        assert_ne!(expected, bits);

        let elapsed = chain.tip().timestamp - chain.headers()[0].timestamp;
        assert!(u64::from(elapsed) < TARGET_TIMESPAN_SECS / 4);

        chain.append(next_header(&chain, expected, 1)).unwrap();
        assert_eq!(chain.height(), BLOCKS_PER_ADJUSTMENT);
    }

    #[test]
    fn work_accumulates() {
        let mut chain = HeaderChain::with_options(Network::Mainnet, true);
        let genesis_work = chain.chain_work();
        chain
            .append(next_header(&chain, chain.tip().bits, 600))
            .unwrap();
        assert_eq!(chain.chain_work(), genesis_work.wrapping_add(genesis_work));
    }
}
