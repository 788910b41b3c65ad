//! Stock report CLI
//!
//! # Usage
//!
//! ```bash
//! # JSON report from Yahoo Finance prices and SEC filings
//! export SEC_USER_AGENT="my-app (me@example.com)"
//! cargo run --bin stock-report -- report AAPL --range 6mo
//!
//! # Offline cost-averaging calculations
//! cargo run --bin stock-report -- average quantity --avg-price 75000 --quantity 100 --price 70000 --add 10
//! cargo run --bin stock-report -- scenarios --avg-price 75000 --quantity 100 --price 70000
//! cargo run --bin stock-report -- target --avg-price 75000 --quantity 100 --price 70000 --target 74000
//! ```

use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use std::sync::Arc;
use stock_report::api::{SecEdgarClient, YahooFinanceClient};
use stock_report::{
    AveragingCalculator, AveragingMode, AveragingResult, Position, PriceRange, ReportAggregator,
    ReportConfig, ReportOptions,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stock-report")]
#[command(about = "Stock reports and cost-averaging calculations", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a report and print it as JSON
    Report {
        symbol: String,
        #[arg(long, default_value = "1y")]
        range: PriceRange,
        /// Annual periods in the financial trend
        #[arg(long, default_value_t = 3)]
        periods: usize,
    },
    /// New average price after one additional purchase
    Average {
        #[command(subcommand)]
        mode: AverageMode,
    },
    /// Average price for several purchase sizes
    Scenarios {
        #[command(flatten)]
        holding: HoldingArgs,
        /// Purchase price
        #[arg(long)]
        price: f64,
        /// Extra share counts, comma separated [default: 1,5,10,20]
        #[arg(long, value_delimiter = ',')]
        steps: Vec<u64>,
    },
    /// Shares needed to reach a target average price
    Target {
        #[command(flatten)]
        holding: HoldingArgs,
        /// Purchase price
        #[arg(long)]
        price: f64,
        /// Desired average price
        #[arg(long)]
        target: f64,
    },
}

#[derive(Subcommand, Debug)]
enum AverageMode {
    /// Buy a fixed number of shares
    Quantity {
        #[command(flatten)]
        holding: HoldingArgs,
        #[arg(long)]
        price: f64,
        #[arg(long = "add")]
        additional_quantity: u64,
        /// Price used to value the position
        #[arg(long)]
        market_price: Option<f64>,
    },
    /// Spend a fixed amount
    Amount {
        #[command(flatten)]
        holding: HoldingArgs,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        amount: f64,
        /// Price used to value the position
        #[arg(long)]
        market_price: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct HoldingArgs {
    /// Current average price
    #[arg(long)]
    avg_price: f64,
    /// Shares currently held
    #[arg(long)]
    quantity: u64,
}

impl HoldingArgs {
    fn position(&self) -> Position {
        Position::new(self.avg_price, self.quantity)
    }
}

/// Group digits in threes: 8200000 -> 8,200,000
fn grouped(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

fn numeric(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

fn result_table(result: &AveragingResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["항목", "값"]);

    let rows = [
        ("추가 매수 수량", result.additional_quantity.to_string()),
        ("추가 매수 금액", grouped(result.additional_cost)),
        ("새 평단가", grouped(result.new_avg_price)),
        (
            "평단가 변화",
            format!("{} ({:+.2}%)", grouped(result.avg_price_change), result.avg_price_change_pct),
        ),
        ("총 보유 수량", result.total_quantity.to_string()),
        ("총 매수 금액", grouped(result.total_cost)),
        ("손익분기점", grouped(result.breakeven_price)),
        (
            "현재가 매도 시 손익",
            format!("{} ({:+.2}%)", grouped(result.profit_if_sell_now), result.profit_pct),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), numeric(value)]);
    }
    table
}

async fn run_report(symbol: &str, range: PriceRange, periods: usize) -> anyhow::Result<()> {
    let config = ReportConfig::from_env()?;
    let aggregator = ReportAggregator::new(
        Arc::new(YahooFinanceClient::new()),
        Arc::new(SecEdgarClient::new(config.sec_user_agent.clone())),
        config,
    );

    let options = ReportOptions {
        range,
        financial_periods: periods,
        ..ReportOptions::default()
    };
    let report = aggregator.get_report(symbol, &options).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_average(mode: &AverageMode) -> anyhow::Result<()> {
    let calculator = AveragingCalculator::new();
    let result = match mode {
        AverageMode::Quantity {
            holding,
            price,
            additional_quantity,
            market_price,
        } => calculator.calculate(
            holding.position(),
            AveragingMode::Quantity {
                additional_price: *price,
                additional_quantity: *additional_quantity,
            },
            *market_price,
        )?,
        AverageMode::Amount {
            holding,
            price,
            amount,
            market_price,
        } => calculator.calculate(
            holding.position(),
            AveragingMode::Amount {
                investment_amount: *amount,
                purchase_price: *price,
            },
            *market_price,
        )?,
    };

    println!("{}", result_table(&result));
    Ok(())
}

fn run_scenarios(holding: &HoldingArgs, price: f64, steps: &[u64]) -> anyhow::Result<()> {
    let rows = AveragingCalculator::new().calculate_scenarios(holding.position(), price, steps, None)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["추가 수량", "추가 금액", "새 평단가", "변화율", "총 수량"]);
    for row in &rows {
        let result = &row.result;
        table.add_row(vec![
            numeric(row.additional_quantity),
            numeric(grouped(result.additional_cost)),
            numeric(grouped(result.new_avg_price)),
            numeric(format!("{:+.2}%", result.avg_price_change_pct)),
            numeric(result.total_quantity),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn run_target(holding: &HoldingArgs, price: f64, target: f64) -> anyhow::Result<()> {
    let result = AveragingCalculator::new().target_quantity(holding.position(), price, target)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["항목", "값"]);
    table.add_row(vec![Cell::new("목표 평단가"), numeric(grouped(result.target_avg_price.round() as i64))]);
    table.add_row(vec![Cell::new("필요 수량"), numeric(result.required_quantity)]);
    table.add_row(vec![Cell::new("추가 매수 금액"), numeric(grouped(result.additional_cost))]);
    table.add_row(vec![Cell::new("예상 평단가"), numeric(grouped(result.resulting_avg_price))]);

    println!("{table}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        report_utils::init_json_tracing("warn,stock_report=info");
    } else {
        report_utils::init_tracing("warn,stock_report=info");
    }

    info!(command = ?cli.command, "starting stock-report");

    match &cli.command {
        Command::Report {
            symbol,
            range,
            periods,
        } => run_report(symbol, *range, *periods).await,
        Command::Average { mode } => run_average(mode),
        Command::Scenarios {
            holding,
            price,
            steps,
        } => run_scenarios(holding, *price, steps),
        Command::Target {
            holding,
            price,
            target,
        } => run_target(holding, *price, *target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped() {
        assert_eq!(grouped(0), "0");
        assert_eq!(grouped(999), "999");
        assert_eq!(grouped(8_200_000), "8,200,000");
        assert_eq!(grouped(-455), "-455");
        assert_eq!(grouped(-1_234_567), "-1,234,567");
    }

    #[test]
    fn test_cli_parses_average_quantity() {
        let cli = Cli::try_parse_from([
            "stock-report",
            "average",
            "quantity",
            "--avg-price",
            "75000",
            "--quantity",
            "100",
            "--price",
            "70000",
            "--add",
            "10",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Average {
                mode: AverageMode::Quantity {
                    additional_quantity: 10,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_cli_parses_report_range() {
        let cli = Cli::try_parse_from(["stock-report", "report", "005930", "--range", "3mo"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Report {
                range: PriceRange::ThreeMonths,
                periods: 3,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["stock-report", "report", "AAPL", "--range", "7y"]).is_err());
    }
}
