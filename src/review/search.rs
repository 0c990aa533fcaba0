use std::collections::HashMap;

use crate::api::Stock;

/// Stocks whose name, short name or code contains the query (case-insensitive).
/// A blank query matches nothing.
pub fn search_stocks<'a>(stocks: &'a [Stock], query: &str) -> Vec<&'a Stock> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }

    stocks
        .iter()
        .filter(|s| {
            s.name_kr.to_lowercase().contains(&q)
                || s.name_kr_short.to_lowercase().contains(&q)
                || s.stock_code.contains(&q)
        })
        .collect()
}

/// Every stock the console has seen, keyed by code, for labelling selections
#[derive(Debug, Clone, Default)]
pub struct StockCatalog {
    stocks: HashMap<String, Stock>,
}

impl StockCatalog {
    pub fn extend<I: IntoIterator<Item = Stock>>(&mut self, stocks: I) {
        for stock in stocks {
            self.stocks.insert(stock.stock_code.clone(), stock);
        }
    }

    pub fn get(&self, stock_code: &str) -> Option<&Stock> {
        self.stocks.get(stock_code)
    }

    /// `short name (code)`, or just the code for stocks never seen
    pub fn label(&self, stock_code: &str) -> String {
        match self.get(stock_code) {
            Some(stock) => format!("{} ({})", stock.name_kr_short, stock.stock_code),
            None => stock_code.to_string(),
        }
    }
}
