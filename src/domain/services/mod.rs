pub mod valuation;
