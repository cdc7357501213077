use std::{collections::HashSet, fmt, path::PathBuf};

use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::error;

/// A ticker understood by Yahoo and the file name its history is saved under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub ticker: String,
    pub alias: String,
}

/// Ordered ticker -> alias mapping. Iteration follows insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new<I, T, A>(pairs: I) -> Result<Self, error::Registry>
    where
        I: IntoIterator<Item = (T, A)>,
        T: Into<String>,
        A: Into<String>,
    {
        let mut tickers = HashSet::new();
        let mut aliases = HashSet::new();
        let mut entries = Vec::new();
        for (ticker, alias) in pairs {
            let ticker = ticker.into();
            let alias = alias.into();
            if ticker.trim().is_empty() {
                return Err(error::Registry::EmptyTicker);
            }
            if !is_valid_alias(&alias) {
                return Err(error::Registry::InvalidAlias(alias));
            }
            if !tickers.insert(ticker.clone()) {
                return Err(error::Registry::DuplicateTicker(ticker));
            }
            if !aliases.insert(alias.clone()) {
                return Err(error::Registry::DuplicateAlias(alias));
            }
            entries.push(Entry { ticker, alias });
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && alias != "."
        && alias != ".."
        && !alias.contains(['/', '\\', '\0'])
}

/// Accepts either a map (`AAPL: apple`) or a list of `{ticker, alias}`
/// entries, keeping document order.
impl<'de> Deserialize<'de> for Registry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = Registry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(
                    "a map of ticker to alias or a list of {ticker, alias} \
                     entries",
                )
            }

            fn visit_map<M>(self, mut map: M) -> Result<Registry, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut pairs = Vec::new();
                while let Some((ticker, alias)) =
                    map.next_entry::<String, String>()?
                {
                    pairs.push((ticker, alias));
                }
                Registry::new(pairs).map_err(de::Error::custom)
            }

            fn visit_seq<S>(self, mut seq: S) -> Result<Registry, S::Error>
            where
                S: SeqAccess<'de>,
            {
                let mut pairs = Vec::new();
                while let Some(Entry { ticker, alias }) = seq.next_element()? {
                    pairs.push((ticker, alias));
                }
                Registry::new(pairs).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(RegistryVisitor)
    }
}

/// The two built-in registries.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    /// Sector leaders, a few ADRs, crypto and the major US indices.
    #[default]
    Core,
    /// Broader coverage including semis, SaaS, biotech, FX and futures.
    Extended,
}

impl Preset {
    pub fn registry(self) -> Registry {
        let pairs = match self {
            Preset::Core => CORE,
            Preset::Extended => EXTENDED,
        };
        Registry {
            entries: pairs
                .iter()
                .map(|(ticker, alias)| Entry {
                    ticker: (*ticker).to_string(),
                    alias: (*alias).to_string(),
                })
                .collect(),
        }
    }

    /// Whether the preset downloads split/dividend adjusted prices.
    pub fn adjust(self) -> bool {
        match self {
            Preset::Core => false,
            Preset::Extended => true,
        }
    }

    /// The core preset runs from the repository root, the extended one from
    /// a sibling directory of `data/`.
    pub fn default_output_dir(self) -> PathBuf {
        match self {
            Preset::Core => PathBuf::from("./data/yfinance"),
            Preset::Extended => PathBuf::from("../data/yfinance"),
        }
    }
}

const CORE: &[(&str, &str)] = &[
    // Big tech
    ("AAPL", "apple"),
    ("MSFT", "microsoft"),
    ("GOOGL", "alphabet"),
    ("NVDA", "nvidia"),
    ("META", "meta"),
    // Finance
    ("JPM", "jpmorgan"),
    ("V", "visa"),
    ("BRK-B", "berkshire_hathaway"),
    // Healthcare
    ("UNH", "unitedhealth"),
    ("JNJ", "johnson_and_johnson"),
    ("PFE", "pfizer"),
    // Consumer discretionary
    ("AMZN", "amazon"),
    ("TSLA", "tesla"),
    ("MCD", "mcdonalds"),
    // Consumer staples
    ("WMT", "walmart"),
    ("KO", "coca_cola"),
    ("PG", "procter_gamble"),
    // Energy
    ("XOM", "exxonmobil"),
    ("CVX", "chevron"),
    // Industrials
    ("CAT", "caterpillar"),
    ("UNP", "union_pacific"),
    ("BA", "boeing"),
    // Utilities
    ("NEE", "nextera_energy"),
    ("DUK", "duke_energy"),
    // Real estate
    ("PLD", "prologis"),
    ("AMT", "american_tower"),
    // Materials
    ("LIN", "linde"),
    ("FCX", "freeport_mcmoran"),
    // Telecom
    ("VZ", "verizon"),
    ("TMUS", "tmobile"),
    // ADRs
    ("TSM", "taiwan_semiconductor"),
    ("ASML", "asml"),
    ("TM", "toyota"),
    ("BABA", "alibaba"),
    // Crypto
    ("BTC-USD", "bitcoin"),
    ("ETH-USD", "ethereum"),
    ("SOL-USD", "solana"),
    // Indices
    ("^GSPC", "sp500"),
    ("^NDX", "nasdaq100"),
    ("^DJI", "dow_jones"),
    ("^RUT", "russell2000"),
];

const EXTENDED: &[(&str, &str)] = &[
    // Big tech
    ("AAPL", "apple"),
    ("MSFT", "microsoft"),
    ("GOOGL", "alphabet"),
    ("NVDA", "nvidia"),
    ("META", "meta"),
    ("AMZN", "amazon"),
    ("TSLA", "tesla"),
    // Semiconductors and hardware
    ("AMD", "amd"),
    ("AVGO", "broadcom"),
    ("ARM", "arm_holdings"),
    ("MU", "micron"),
    ("SMCI", "super_micro_computer"),
    ("INTC", "intel"),
    ("QCOM", "qualcomm"),
    ("AMAT", "applied_materials"),
    // Cloud and software
    ("CRM", "salesforce"),
    ("ORCL", "oracle"),
    ("NOW", "servicenow"),
    ("PLTR", "palantir"),
    ("SNOW", "snowflake"),
    ("ADBE", "adobe"),
    // Cybersecurity
    ("PANW", "palo_alto_networks"),
    ("CRWD", "crowdstrike"),
    ("FTNT", "fortinet"),
    ("ZS", "zscaler"),
    ("OKTA", "okta"),
    // Banks and conglomerates
    ("JPM", "jpmorgan"),
    ("BAC", "bank_of_america"),
    ("GS", "goldman_sachs"),
    ("MS", "morgan_stanley"),
    ("BRK-B", "berkshire_hathaway"),
    // Payments
    ("V", "visa"),
    ("MA", "mastercard"),
    ("PYPL", "paypal"),
    ("SQ", "block"),
    ("COIN", "coinbase"),
    // GLP-1
    ("LLY", "eli_lilly"),
    ("NVO", "novo_nordisk"),
    // Pharma and insurance
    ("UNH", "unitedhealth"),
    ("JNJ", "johnson_and_johnson"),
    ("PFE", "pfizer"),
    ("ABBV", "abbvie"),
    ("AMGN", "amgen"),
    // Genomics
    ("ILMN", "illumina"),
    ("CRSP", "crispr_therapeutics"),
    ("VRTX", "vertex"),
    // Consumer discretionary
    ("MCD", "mcdonalds"),
    ("SBUX", "starbucks"),
    ("NKE", "nike"),
    ("BKNG", "booking_holdings"),
    ("HD", "home_depot"),
    ("COST", "costco"),
    // Consumer staples
    ("WMT", "walmart"),
    ("KO", "coca_cola"),
    ("PEP", "pepsico"),
    ("PG", "procter_gamble"),
    // Energy
    ("XOM", "exxonmobil"),
    ("CVX", "chevron"),
    ("NEE", "nextera_energy"),
    ("VST", "vistra_corp"),
    ("OKLO", "oklo_inc"),
    // Industrials and materials
    ("CAT", "caterpillar"),
    ("UNP", "union_pacific"),
    ("BA", "boeing"),
    ("GE", "general_electric"),
    ("LIN", "linde"),
    ("FCX", "freeport_mcmoran"),
    // Real estate and utilities
    ("PLD", "prologis"),
    ("AMT", "american_tower"),
    ("DUK", "duke_energy"),
    // Telecom and media
    ("VZ", "verizon"),
    ("TMUS", "tmobile"),
    ("NFLX", "netflix"),
    ("DIS", "disney"),
    // ADRs
    ("TSM", "taiwan_semiconductor"),
    ("ASML", "asml"),
    ("TM", "toyota"),
    ("BABA", "alibaba"),
    ("HDB", "hdfc_bank"),
    ("MELI", "mercadolibre"),
    // Crypto
    ("BTC-USD", "bitcoin"),
    ("ETH-USD", "ethereum"),
    ("SOL-USD", "solana"),
    ("BNB-USD", "binance_coin"),
    // Indices and macro
    ("^GSPC", "sp500"),
    ("^NDX", "nasdaq100"),
    ("^DJI", "dow_jones"),
    ("^RUT", "russell2000"),
    ("DX-Y.NYB", "us_dollar_index"),
    ("GC=F", "gold_futures"),
    ("CL=F", "crude_oil"),
];
