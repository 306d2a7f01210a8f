//! Report aggregation over expenses and sales.
//!
//! Every dimension is built in a single pass over its input. Rankings sort
//! by total descending; the sort is stable, so ties keep the order in which
//! the key was first seen.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::calculator::percent_of;
use crate::models::{DateRange, Expense, ExpenseCategory, Sale};

const UNCATEGORIZED: &str = "Uncategorized";
const NO_VENDOR: &str = "No vendor";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub label: String,
    pub total: Decimal,
    pub count: usize,
    pub average: Decimal,
    /// Share of the dimension's grand total.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyRow {
    /// `YYYY-MM`
    pub month: String,
    pub sales: Decimal,
    pub cogs: Decimal,
    pub net_profit: Decimal,
    pub expenses: Decimal,
    pub net_income: Decimal,
    pub sale_count: usize,
    pub expense_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_sales: Decimal,
    pub total_cogs: Decimal,
    pub total_fees: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub total_expenses: Decimal,
    /// Net profit on sales less expenses.
    pub net_income: Decimal,
    pub outstanding_balance: Decimal,
    pub sale_count: usize,
    pub expense_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub range: DateRange,
    pub summary: ReportSummary,
    pub expenses_by_category: Vec<ReportRow>,
    pub expenses_by_main_category: Vec<ReportRow>,
    pub expenses_by_vendor: Vec<ReportRow>,
    pub sales_by_customer: Vec<ReportRow>,
    pub sales_by_product_type: Vec<ReportRow>,
    pub monthly: Vec<MonthlyRow>,
}

/// Accumulates rows keyed by string, remembering first-seen order.
#[derive(Default)]
struct Grouping {
    index: HashMap<String, usize>,
    rows: Vec<(String, String, Decimal, usize)>,
}

impl Grouping {
    fn add(&mut self, key: String, label: &str, amount: Decimal) {
        match self.index.get(&key) {
            Some(&i) => {
                let row = &mut self.rows[i];
                row.2 += amount;
                row.3 += 1;
            }
            None => {
                self.index.insert(key.clone(), self.rows.len());
                self.rows.push((key, label.to_string(), amount, 1));
            }
        }
    }

    fn finish(self, top_n: Option<usize>) -> Vec<ReportRow> {
        let grand_total: Decimal = self.rows.iter().map(|r| r.2).sum();
        let mut rows: Vec<ReportRow> = self
            .rows
            .into_iter()
            .map(|(key, label, total, count)| ReportRow {
                key,
                label,
                total,
                count,
                average: total / Decimal::from(count),
                percentage: percent_of(total, grand_total),
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        if let Some(n) = top_n {
            rows.truncate(n);
        }
        rows
    }
}

fn category_key(id: Option<Uuid>) -> String {
    id.map_or_else(|| UNCATEGORIZED.to_lowercase(), |id| id.to_string())
}

/// Build the report for `range`. Records outside the range are ignored, so
/// callers may pass unfiltered listings. `top_n` limits every ranked
/// dimension; the monthly series is never truncated.
pub fn build_report(
    range: DateRange,
    expenses: &[Expense],
    sales: &[Sale],
    categories: &[ExpenseCategory],
    top_n: Option<usize>,
) -> Report {
    let by_id: HashMap<Uuid, &ExpenseCategory> = categories.iter().map(|c| (c.id, c)).collect();

    let mut summary = ReportSummary::default();
    let mut by_category = Grouping::default();
    let mut by_main_category = Grouping::default();
    let mut by_vendor = Grouping::default();
    let mut by_customer = Grouping::default();
    let mut by_product = Grouping::default();
    let mut monthly: BTreeMap<String, MonthlyRow> = BTreeMap::new();

    for expense in expenses.iter().filter(|e| range.contains(e.date)) {
        summary.total_expenses += expense.amount;
        summary.expense_count += 1;

        let category = expense.category_id.and_then(|id| by_id.get(&id).copied());
        match category {
            Some(category) => {
                by_category.add(category.id.to_string(), &category.name, expense.amount);
                let main = category
                    .parent_id
                    .and_then(|id| by_id.get(&id).copied())
                    .unwrap_or(category);
                by_main_category.add(main.id.to_string(), &main.name, expense.amount);
            }
            None => {
                by_category.add(category_key(None), UNCATEGORIZED, expense.amount);
                by_main_category.add(category_key(None), UNCATEGORIZED, expense.amount);
            }
        }

        let vendor = expense
            .vendor
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());
        match vendor {
            Some(name) => by_vendor.add(name.to_lowercase(), name, expense.amount),
            None => by_vendor.add(NO_VENDOR.to_lowercase(), NO_VENDOR, expense.amount),
        }

        let month = monthly
            .entry(expense.date.format("%Y-%m").to_string())
            .or_default();
        month.expenses += expense.amount;
        month.expense_count += 1;
    }

    for sale in sales.iter().filter(|s| range.contains(s.transaction_date)) {
        summary.total_sales += sale.sale_amount;
        summary.total_cogs += sale.cogs;
        summary.total_fees += sale.derived.transaction_fee_amount;
        summary.gross_profit += sale.derived.profit_loss;
        summary.net_profit += sale.derived.net_profit_loss;
        summary.outstanding_balance += sale.derived.outstanding_balance;
        summary.sale_count += 1;

        let customer_key = sale
            .customer_id
            .map_or_else(|| sale.customer_phone.clone(), |id| id.to_string());
        by_customer.add(customer_key, &sale.customer_name, sale.sale_amount);

        let product_type = sale.product_type();
        by_product.add(
            product_type.as_str().to_string(),
            product_type.as_str(),
            sale.sale_amount,
        );

        let month = monthly
            .entry(sale.transaction_date.format("%Y-%m").to_string())
            .or_default();
        month.sales += sale.sale_amount;
        month.cogs += sale.cogs;
        month.net_profit += sale.derived.net_profit_loss;
        month.sale_count += 1;
    }

    summary.net_income = summary.net_profit - summary.total_expenses;

    let monthly = monthly
        .into_iter()
        .map(|(month, row)| MonthlyRow {
            month,
            net_income: row.net_profit - row.expenses,
            ..row
        })
        .collect();

    Report {
        range,
        summary,
        expenses_by_category: by_category.finish(top_n),
        expenses_by_main_category: by_main_category.finish(top_n),
        expenses_by_vendor: by_vendor.finish(top_n),
        sales_by_customer: by_customer.finish(top_n),
        sales_by_product_type: by_product.finish(top_n),
        monthly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApprovalStatus, DerivedFields, PaymentStatus, ProductDetails, VisaDetails,
    };
    use crate::services::calculator::{compute, FinancialInputs};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn expense(date: NaiveDate, amount: Decimal, vendor: Option<&str>, category: Option<Uuid>) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            date,
            category_id: category,
            amount,
            currency: "BDT".to_string(),
            paid_through: None,
            tax_amount: None,
            tax_percentage: None,
            vendor: vendor.map(str::to_string),
            reference_number: None,
            notes: None,
            customer_name: None,
            attachment_urls: Vec::new(),
            approval_status: ApprovalStatus::Pending,
            tags: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sale(date: NaiveDate, customer: &str, amount: Decimal, cogs: Decimal) -> Sale {
        let derived: DerivedFields = compute(FinancialInputs {
            sale_amount: amount,
            cogs,
            transaction_fee_percent: Decimal::ZERO,
            payment_received: Decimal::ZERO,
        });
        Sale {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            transaction_date: date,
            customer_id: None,
            customer_name: customer.to_string(),
            customer_phone: format!("017{}", customer.len()),
            customer_email: None,
            sale_amount: amount,
            cogs,
            transaction_fee_percent: Decimal::ZERO,
            payment_received: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            details: ProductDetails::Visa(VisaDetails::default()),
            derived,
            attachment_urls: Vec::new(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn category(name: &str, parent_id: Option<Uuid>) -> ExpenseCategory {
        ExpenseCategory {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            parent_id,
        }
    }

    #[test]
    fn summary_totals_and_net_income() {
        let expenses = vec![expense(day(1, 5), dec!(300), Some("Landlord"), None)];
        let sales = vec![
            sale(day(1, 10), "Karim", dec!(1000), dec!(600)),
            sale(day(2, 10), "Rahim", dec!(500), dec!(200)),
        ];

        let report = build_report(DateRange::default(), &expenses, &sales, &[], None);

        assert_eq!(report.summary.total_sales, dec!(1500));
        assert_eq!(report.summary.total_cogs, dec!(800));
        assert_eq!(report.summary.gross_profit, dec!(700));
        assert_eq!(report.summary.net_income, dec!(400));
        assert_eq!(report.summary.outstanding_balance, dec!(1500));
        assert_eq!(report.summary.sale_count, 2);
        assert_eq!(report.summary.expense_count, 1);
    }

    #[test]
    fn records_outside_the_range_are_ignored() {
        let sales = vec![
            sale(day(1, 10), "Karim", dec!(1000), dec!(600)),
            sale(day(3, 10), "Rahim", dec!(500), dec!(200)),
        ];
        let range = DateRange {
            from: Some(day(2, 1)),
            to: Some(day(3, 31)),
        };

        let report = build_report(range, &[], &sales, &[], None);
        assert_eq!(report.summary.total_sales, dec!(500));
        assert_eq!(report.monthly.len(), 1);
        assert_eq!(report.monthly[0].month, "2024-03");
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let expenses = vec![
            expense(day(1, 1), dec!(100), Some("Beta"), None),
            expense(day(1, 2), dec!(100), Some("Alpha"), None),
            expense(day(1, 3), dec!(250), Some("Gamma"), None),
        ];

        let report = build_report(DateRange::default(), &expenses, &[], &[], Some(2));
        let labels: Vec<&str> = report
            .expenses_by_vendor
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Gamma", "Beta"]);
    }

    #[test]
    fn rows_carry_count_average_and_share() {
        let sales = vec![
            sale(day(1, 1), "Karim", dec!(100), dec!(0)),
            sale(day(1, 2), "Karim", dec!(200), dec!(0)),
            sale(day(1, 3), "Rahim", dec!(100), dec!(0)),
        ];

        let report = build_report(DateRange::default(), &[], &sales, &[], None);
        let karim = &report.sales_by_customer[0];
        assert_eq!(karim.label, "Karim");
        assert_eq!(karim.total, dec!(300));
        assert_eq!(karim.count, 2);
        assert_eq!(karim.average, dec!(150));
        assert_eq!(karim.percentage, dec!(75));

        assert_eq!(report.sales_by_product_type.len(), 1);
        assert_eq!(report.sales_by_product_type[0].label, "Visa");
    }

    #[test]
    fn sub_categories_roll_up_to_their_main_category() {
        let office = category("Office", None);
        let rent = category("Rent", Some(office.id));
        let power = category("Electricity", Some(office.id));
        let categories = vec![office.clone(), rent.clone(), power.clone()];
        let expenses = vec![
            expense(day(1, 1), dec!(1000), None, Some(rent.id)),
            expense(day(1, 2), dec!(200), None, Some(power.id)),
            expense(day(1, 3), dec!(50), None, None),
        ];

        let report = build_report(DateRange::default(), &expenses, &[], &categories, None);

        assert_eq!(report.expenses_by_category.len(), 3);
        let main = &report.expenses_by_main_category;
        assert_eq!(main.len(), 2);
        assert_eq!(main[0].label, "Office");
        assert_eq!(main[0].total, dec!(1200));
        assert_eq!(main[0].count, 2);
        assert_eq!(main[1].label, UNCATEGORIZED);
        assert_eq!(report.expenses_by_vendor[0].label, NO_VENDOR);
    }

    #[test]
    fn empty_input_gives_an_empty_report() {
        let report = build_report(DateRange::default(), &[], &[], &[], Some(5));
        assert_eq!(report.summary, ReportSummary::default());
        assert!(report.expenses_by_category.is_empty());
        assert!(report.monthly.is_empty());
    }
}
