use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tour_package_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    services::{coupons::CouponInput, TourServices},
};
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::Stats(command) => handle_stats_command(&context, command, cli.json).await?,
        Commands::Loyalty(command) => handle_loyalty_command(&context, command, cli.json).await?,
        Commands::Coupons(command) => handle_coupons_command(&context, command, cli.json).await?,
        Commands::Packages(command) => handle_packages_command(&context, command, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "tour-admin", about = "Operator tooling for tour packages and loyalty rewards", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    #[command(subcommand)]
    Stats(StatsCommands),
    #[command(subcommand)]
    Loyalty(LoyaltyCommands),
    #[command(subcommand)]
    Coupons(CouponsCommands),
    #[command(subcommand)]
    Packages(PackagesCommands),
}

#[derive(Subcommand)]
enum StatsCommands {
    /// Revenue per activity type
    Revenue(RevenueArgs),
    /// Revenue per month of a year
    Yearly(YearlyArgs),
}

#[derive(Args)]
struct RevenueArgs {
    #[arg(long, help = "Year the packages start in")]
    year: i32,
    #[arg(long, help = "Restrict to one month (1-12)")]
    month: Option<u32>,
}

#[derive(Args)]
struct YearlyArgs {
    #[arg(long)]
    year: i32,
}

#[derive(Subcommand)]
enum LoyaltyCommands {
    AddPoints(AddPointsArgs),
    Balance(CustomerArgs),
    Dashboard(CustomerArgs),
}

#[derive(Args)]
struct AddPointsArgs {
    #[arg(long, help = "Customer id (UUID)")]
    customer: Uuid,
    #[arg(long, help = "Points to grant; must be positive")]
    points: i64,
}

#[derive(Args)]
struct CustomerArgs {
    #[arg(long, help = "Customer id (UUID)")]
    customer: Uuid,
}

#[derive(Subcommand)]
enum CouponsCommands {
    List,
    Create(CreateCouponArgs),
}

#[derive(Args)]
struct CreateCouponArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, help = "Point cost of the coupon")]
    points: i64,
    #[arg(long, help = "Discount percentage (1-100)")]
    percent_off: i32,
}

#[derive(Subcommand)]
enum PackagesCommands {
    /// Process a package whose plans are all processed
    Process(PackageIdArgs),
    /// Show a package with its plans and line items
    Show(PackageIdArgs),
}

#[derive(Args)]
struct PackageIdArgs {
    #[arg(long, help = "Package id (UUID)")]
    id: Uuid,
}

struct CliContext {
    db: Arc<DbPool>,
    services: TourServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate {
            db::run_migrations(&db_pool)
                .await
                .context("failed to run migrations")?;
        }

        let db = Arc::new(db_pool);
        let config: Arc<AppConfig> = Arc::new(config);
        let services = TourServices::new(db.clone(), config);

        Ok(Self { db, services })
    }
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    info!("Migrations applied");
    println!("Migrations applied");
    Ok(())
}

async fn handle_stats_command(context: &CliContext, command: StatsCommands, json: bool) -> Result<()> {
    let stats = &context.services.statistics;
    match command {
        StatsCommands::Revenue(args) => {
            let buckets = stats
                .revenue_by_activity_type(args.year, args.month)
                .await
                .context("failed to compute revenue by activity type")?;
            if json {
                print_json(&buckets)?;
            } else {
                match args.month {
                    Some(month) => println!("Revenue for {}-{:02}:", args.year, month),
                    None => println!("Revenue for {}:", args.year),
                }
                for bucket in buckets {
                    println!("  {:<16} {}", bucket.activity_type, bucket.revenue);
                }
            }
        }
        StatsCommands::Yearly(args) => {
            let months = stats
                .yearly_revenue(args.year)
                .await
                .context("failed to compute yearly revenue")?;
            if json {
                print_json(&months)?;
            } else {
                println!("Monthly revenue for {}:", args.year);
                for month in months {
                    println!("  {:>2}  {}", month.month, month.revenue);
                }
            }
        }
    }
    Ok(())
}

async fn handle_loyalty_command(context: &CliContext, command: LoyaltyCommands, json: bool) -> Result<()> {
    let loyalty = &context.services.loyalty;
    match command {
        LoyaltyCommands::AddPoints(args) => {
            let balance = loyalty
                .add_points(args.customer, args.points)
                .await
                .context("failed to add loyalty points")?;
            if json {
                print_json(&balance)?;
            } else {
                println!(
                    "Customer {} now has {} points",
                    balance.customer_id, balance.points
                );
            }
        }
        LoyaltyCommands::Balance(args) => {
            let points = loyalty
                .get_balance(args.customer)
                .await
                .context("failed to read loyalty balance")?;
            if json {
                print_json(&serde_json::json!({
                    "customer_id": args.customer,
                    "points": points,
                }))?;
            } else {
                println!("Customer {} has {} points", args.customer, points);
            }
        }
        LoyaltyCommands::Dashboard(args) => {
            let dashboard = loyalty
                .dashboard(args.customer)
                .await
                .context("failed to load loyalty dashboard")?;
            if json {
                print_json(&dashboard)?;
            } else {
                println!(
                    "Customer {} • {} points • {} coupons ({} active, {} redeemed) • {} in catalog",
                    dashboard.customer_id,
                    dashboard.points,
                    dashboard.total_purchased,
                    dashboard.active_coupons,
                    dashboard.redeemed_coupons,
                    dashboard.available_coupon_count
                );
                for coupon in &dashboard.purchased_coupons {
                    let state = if coupon.is_used() { "used" } else { "active" };
                    println!(
                        "- {} • {} • {}% off • {}",
                        coupon.code, coupon.coupon_name, coupon.percent_off, state
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_coupons_command(context: &CliContext, command: CouponsCommands, json: bool) -> Result<()> {
    let coupons = &context.services.coupons;
    match command {
        CouponsCommands::List => {
            let catalog = coupons.list().await.context("failed to list coupons")?;
            if json {
                print_json(&catalog)?;
            } else if catalog.is_empty() {
                println!("No coupons found");
            } else {
                for coupon in catalog {
                    println!(
                        "- {} • {} • {} points • {}% off",
                        coupon.id, coupon.name, coupon.points, coupon.percent_off
                    );
                }
            }
        }
        CouponsCommands::Create(args) => {
            let coupon = coupons
                .create(CouponInput {
                    name: args.name,
                    description: args.description,
                    points: args.points,
                    percent_off: args.percent_off,
                })
                .await
                .context("failed to create coupon")?;
            if json {
                print_json(&coupon)?;
            } else {
                println!("Created coupon {} ({})", coupon.name, coupon.id);
            }
        }
    }
    Ok(())
}

async fn handle_packages_command(context: &CliContext, command: PackagesCommands, json: bool) -> Result<()> {
    let packages = &context.services.packages;
    match command {
        PackagesCommands::Process(args) => {
            let package = packages
                .process(args.id)
                .await
                .with_context(|| format!("failed to process package {}", args.id))?;
            if json {
                print_json(&package)?;
            } else {
                println!(
                    "Package {} processed • price {}",
                    package.id, package.price
                );
            }
        }
        PackagesCommands::Show(args) => {
            let detail = packages
                .get_with_plans(args.id)
                .await
                .with_context(|| format!("failed to load package {}", args.id))?;
            if json {
                print_json(&detail)?;
            } else {
                let package = &detail.package;
                println!(
                    "Package {} • {} • owner {} • quota {} • {} • price {}",
                    package.id,
                    package.name,
                    package.user_id,
                    package.quota,
                    package.status.as_str(),
                    package.price
                );
                for plan in &detail.plans {
                    println!(
                        "  Plan {} • {} • {} • {} line items • total {}",
                        plan.plan.id,
                        plan.plan.activity_type.display_name(),
                        plan.plan.status.as_str(),
                        plan.ordered_quantities.len(),
                        plan.total_price
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
