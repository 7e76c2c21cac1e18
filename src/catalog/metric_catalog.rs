//! Static registry of the fundamental metrics shown for every company.
//!
//! Iteration order is significant: income statement first, then cash flow, then
//! balance sheet. Selector UIs group by category in that order.

use crate::types::{FilingMetricRow, MetricCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub tag: &'static str,
    pub label: &'static str,
    pub category: MetricCategory,
    /// Set when every filing is expected to carry this tag or one of `alternates`.
    pub required: bool,
    pub alternates: &'static [&'static str],
}

const fn metric(tag: &'static str, label: &'static str, category: MetricCategory) -> MetricDefinition {
    MetricDefinition { tag, label, category, required: false, alternates: &[] }
}

const fn required(
    tag: &'static str,
    label: &'static str,
    category: MetricCategory,
    alternates: &'static [&'static str],
) -> MetricDefinition {
    MetricDefinition { tag, label, category, required: true, alternates }
}

use MetricCategory::{BalanceSheet, CashFlow, IncomeStatement};

pub const WEIGHTED_SHARES_BASIC: &str = "WeightedAverageNumberOfSharesOutstandingBasic";
pub const WEIGHTED_SHARES_DILUTED: &str = "WeightedAverageNumberOfDilutedSharesOutstanding";
pub const COMMON_SHARES_OUTSTANDING: &str = "CommonStockSharesOutstanding";
pub const EPS_BASIC: &str = "EarningsPerShareBasic";
pub const EPS_DILUTED: &str = "EarningsPerShareDiluted";
pub const NET_INCOME: &str = "NetIncomeLoss";

pub static CATALOG: &[MetricDefinition] = &[
    // Income statement
    required("SalesRevenueNet", "Revenue, Net", IncomeStatement, &[]),
    metric("CIRevenuePerShare", "Revenue Per Share", IncomeStatement),
    required("CostOfGoodsAndServicesSold", "Cost of Goods & Services Sold", IncomeStatement, &["OperatingExpenses"]),
    metric("GrossProfit", "Gross Profit", IncomeStatement),
    metric("SellingGeneralAndAdministrativeExpense", "Selling, General & Admin Expense", IncomeStatement),
    metric("ResearchAndDevelopmentExpense", "Research & Development Expense", IncomeStatement),
    required("OperatingExpenses", "Total Operating Expenses", IncomeStatement, &["CostOfGoodsAndServicesSold"]),
    required("OperatingIncomeLoss", "Operating Income", IncomeStatement, &[]),
    metric("IncomeTaxExpenseBenefit", "Income Taxes", IncomeStatement),
    required(NET_INCOME, "Net Income", IncomeStatement, &[]),
    metric(EPS_DILUTED, "Earnings Per Share, Diluted", IncomeStatement),
    required(EPS_BASIC, "Earnings Per Share, Basic", IncomeStatement, &[EPS_DILUTED]),
    // Share counts are dated with the report, i.e. after the quarter ends
    required(WEIGHTED_SHARES_BASIC, "Shares Outstanding, Basic Avg", IncomeStatement, &[WEIGHTED_SHARES_DILUTED]),
    required(WEIGHTED_SHARES_DILUTED, "Shares Outstanding, Diluted Avg", IncomeStatement, &[WEIGHTED_SHARES_BASIC]),
    metric(COMMON_SHARES_OUTSTANDING, "Common Stock Shares Outstanding", IncomeStatement),
    // Cash flow (reported fiscal-year-to-date upstream, de-accumulated on import)
    metric("DepreciationDepletionAndAmortization", "Depreciation, Depletion & Amortization", CashFlow),
    metric("IncreaseDecreaseInAccountsReceivable", "Change in Accounts Receivable", CashFlow),
    required("NetCashProvidedByUsedInOperatingActivities", "Net Cash from Operations", CashFlow, &[]),
    metric("CINetCashFromOpsPerShare", "Net Cash from Operations Per Share", CashFlow),
    metric("PaymentsForRepurchaseOfCommonStock", "Repurchases/Buybacks Common Stock", CashFlow),
    metric("ProceedsFromIssuanceOfLongTermDebt", "Issuance of Long-term Debt", CashFlow),
    metric("PaymentsOfDividends", "Cash Dividends Paid", CashFlow),
    required("NetCashProvidedByUsedInFinancingActivities", "Net Cash from Financing Activities", CashFlow, &[]),
    metric("PaymentsToAcquirePropertyPlantAndEquipment", "Property, Plant & Equipment Purchases", CashFlow),
    metric("PaymentsToAcquireBusinessesNetOfCashAcquired", "Purchases of Businesses, Net of Cash", CashFlow),
    required("NetCashProvidedByUsedInInvestingActivities", "Net Cash from Investing Activities", CashFlow, &[]),
    metric("CashAndCashEquivalentsPeriodIncreaseDecrease", "Net Change in Cash & Equivalents", CashFlow),
    // Balance sheet
    metric("CashAndCashEquivalentsAtCarryingValue", "Cash and Cash Equivalents", BalanceSheet),
    metric("AvailableForSaleSecurities", "Short-Term Investments", BalanceSheet),
    metric("AccountsReceivableNetCurrent", "Accounts Receivable, Net", BalanceSheet),
    metric("InventoryNet", "Inventories", BalanceSheet),
    metric("AssetsCurrent", "Total Current Assets", BalanceSheet),
    metric("PropertyPlantAndEquipmentNet", "Property, Plant & Equipment, Net", BalanceSheet),
    required("Assets", "Total Assets", BalanceSheet, &[]),
    metric("AccountsPayableCurrent", "Accounts Payable", BalanceSheet),
    metric("LongTermDebtCurrent", "Current Portion of Long-Term Debt", BalanceSheet),
    metric("LiabilitiesCurrent", "Total Short-Term Liabilities", BalanceSheet),
    metric("LongTermDebtNoncurrent", "Long Term Debt, Non-Current Portion", BalanceSheet),
    metric("LiabilitiesNoncurrent", "Total Long-Term Liabilities", BalanceSheet),
    required("Liabilities", "Total Liabilities", BalanceSheet, &[]),
];

pub fn lookup(tag: &str) -> Option<&'static MetricDefinition> {
    CATALOG.iter().find(|m| m.tag == tag)
}

pub fn label(tag: &str) -> Option<&'static str> {
    lookup(tag).map(|m| m.label)
}

pub fn in_category(category: MetricCategory) -> impl Iterator<Item = &'static MetricDefinition> {
    CATALOG.iter().filter(move |m| m.category == category)
}

/// Required tags for which `row` has no non-null value for the tag or any alternate.
/// Some filers report OperatingExpenses but not CostOfGoodsAndServicesSold (or the
/// reverse); either satisfies both rules.
pub fn missing_required(row: &FilingMetricRow) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|m| m.required)
        .filter(|m| !row.has_value(m.tag) && !m.alternates.iter().any(|alt| row.has_value(alt)))
        .map(|m| m.tag)
        .collect()
}
