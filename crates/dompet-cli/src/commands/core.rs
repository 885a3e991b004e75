//! Core command implementations
//!
//! - `cmd_init` - Create a starter ledger file

use std::path::Path;

use anyhow::Result;

use crate::store::LedgerFile;

pub fn cmd_init(ledger_path: &Path, force: bool) -> Result<()> {
    if ledger_path.exists() && !force {
        anyhow::bail!(
            "Ledger '{}' sudah ada. Pakai --force untuk menimpa.",
            ledger_path.display()
        );
    }

    let ledger = LedgerFile::starter();
    ledger.save(ledger_path)?;

    println!("🔧 Ledger baru dibuat di {}", ledger_path.display());
    println!("   1 akun: Kas (cash, saldo Rp0)");
    println!();
    println!("Langkah berikutnya:");
    println!("  1. Catat transaksi:   dompet chat \"beli kopi 25rb\"");
    println!("  2. Sesuaikan saldo:   dompet reconcile Kas 500000");
    println!("  3. Tambah akun lain:  edit file ledger-nya langsung");

    Ok(())
}
