// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::env;
use std::path::Path;

use student_tracker::{
    batch_id_for_path, count_students, create_admin, export_unregistered, list_batches,
    normalize_identity, register, setup_database, telemetry, Config, IdentityNumber,
    RegistrationForm, TrackingService,
};

const USAGE: &str = "\
Usage:
  student-tracker import <file> [batch-id]
  student-tracker reconcile <batch-id> [--export <out.csv>]
  student-tracker register <given-name> <family-name> <national-id> <class>
  student-tracker add-admin <username> <password>
  student-tracker check-id <national-id>
  student-tracker batches
  student-tracker ui [batch-id]";

fn main() -> Result<()> {
    telemetry::init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = Config::load()?;

    let command = args.get(1).map(String::as_str).unwrap_or("ui");
    let rest = args.get(2..).unwrap_or(&[]);

    match command {
        // Pure check, no database needed
        "check-id" => run_check_id(rest),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            let conn = open_database(&config)?;
            match command {
                "import" => run_import(&conn, rest),
                "reconcile" => run_reconcile(&conn, rest),
                "register" => run_register(&conn, rest),
                "add-admin" => run_add_admin(&conn, rest),
                "batches" => run_batches(&conn),
                "ui" => run_ui_mode(&conn, rest.first().map(String::as_str)),
                other => {
                    eprintln!("❌ Unknown command: {}\n", other);
                    eprintln!("{}", USAGE);
                    std::process::exit(2);
                }
            }
        }
    }
}

fn open_database(config: &Config) -> Result<Connection> {
    let conn = Connection::open(&config.database.path)?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_import(conn: &Connection, args: &[String]) -> Result<()> {
    let file = args.first().ok_or_else(|| anyhow!("missing <file>\n\n{}", USAGE))?;
    let path = Path::new(file);
    let batch_id = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| batch_id_for_path(path));

    println!("📂 Importing roster {} as batch {}", path.display(), batch_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let service = TrackingService::new("cli");
    let summary = service.import_file(conn, path, &batch_id)?;

    println!("✓ Accepted {} students", summary.accepted);

    if !summary.errors.is_empty() {
        println!("⚠️  Rejected {} rows:", summary.errors.len());
        for error in &summary.errors {
            println!("   {}", error);
        }
    }

    println!("\n{}", summary.summary());
    println!("Next: student-tracker reconcile {}", batch_id);

    Ok(())
}

fn run_reconcile(conn: &Connection, args: &[String]) -> Result<()> {
    let batch_id = args
        .first()
        .ok_or_else(|| anyhow!("missing <batch-id>\n\n{}", USAGE))?;

    let export_path = match args.get(1).map(String::as_str) {
        Some("--export") => Some(
            args.get(2)
                .ok_or_else(|| anyhow!("--export needs an output file"))?,
        ),
        Some(other) => return Err(anyhow!("unexpected argument: {}", other)),
        None => None,
    };

    println!("⚖️  Reconciling batch {}", batch_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let service = TrackingService::new("cli");
    let report = service.reconcile_batch(conn, batch_id)?;

    println!("✓ Expected:     {}", report.expected_count);
    println!("✓ Registered:   {}", report.registered_count);
    println!("✗ Unregistered: {}", report.unregistered_count);
    println!("  Flags changed: {}", report.changed_count);
    println!("  Rate: {:.1}%", report.registration_rate() * 100.0);

    for student in &report.outcome.unregistered {
        println!(
            "   {}  {:<30} {}",
            student.national_id,
            student.full_name(),
            student.class
        );
    }

    if let Some(out) = export_path {
        let written = export_unregistered(Path::new(out), &report.outcome.unregistered)?;
        println!("\n💾 Wrote {} unregistered students to {}", written, out);
    }

    if report.is_complete() {
        println!("\n🎉 Every expected student is registered");
    }

    Ok(())
}

fn run_register(conn: &Connection, args: &[String]) -> Result<()> {
    let [given_name, family_name, national_id, class] = args else {
        return Err(anyhow!("register needs exactly 4 arguments\n\n{}", USAGE));
    };

    let form = RegistrationForm {
        given_name: given_name.clone(),
        family_name: family_name.clone(),
        national_id: national_id.clone(),
        class: class.clone(),
    };

    let student = register(conn, &form, Utc::now())?;
    println!(
        "✓ Registered {} ({}) in class {}",
        student.full_name(),
        student.national_id,
        student.class
    );
    println!("  Registered students: {}", count_students(conn)?);

    Ok(())
}

fn run_add_admin(conn: &Connection, args: &[String]) -> Result<()> {
    let [username, password] = args else {
        return Err(anyhow!("add-admin needs <username> <password>\n\n{}", USAGE));
    };

    create_admin(conn, username, password)?;
    println!("✓ Admin {} created", username.trim());

    Ok(())
}

fn run_check_id(args: &[String]) -> Result<()> {
    let input = args
        .first()
        .ok_or_else(|| anyhow!("missing <national-id>\n\n{}", USAGE))?;

    match IdentityNumber::parse(&normalize_identity(input)) {
        Ok(id) => println!("✓ {} is a valid national id", id),
        Err(e) => {
            println!("✗ {} is not valid: {}", input, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run_batches(conn: &Connection) -> Result<()> {
    let batches = list_batches(conn)?;

    if batches.is_empty() {
        println!("No batches uploaded yet. Run: student-tracker import <file>");
        return Ok(());
    }

    println!(
        "{:<20} {:<28} {:>8} {:>8}  {}",
        "Batch", "Source", "Rows", "Errors", "Reconciled"
    );
    for batch in batches {
        let reconciled = batch
            .reconciled_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<20} {:<28} {:>8} {:>8}  {}",
            batch.batch_id, batch.source_file, batch.accepted_rows, batch.rejected_rows, reconciled
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection, batch_id: Option<&str>) -> Result<()> {
    println!("🖥️  Loading Student Tracker UI...\n");

    let mut app = ui::load_app(conn, batch_id)?;

    println!(
        "✓ Loaded {} registered and {} expected students\n",
        app.registered.len(),
        app.expected.len()
    );
    println!("Starting UI... (Press 'q' to quit)\n");

    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: &Connection, _batch_id: Option<&str>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin tracker-server --features server");
    std::process::exit(1);
}
