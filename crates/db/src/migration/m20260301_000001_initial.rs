//! Initial database migration.
//!
//! Creates the ledger enums, tables, indexes and guard triggers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: FINANCIAL PERIODS
        // ============================================================
        db.execute_unprepared(FINANCIAL_PERIODS_SQL).await?;

        // ============================================================
        // PART 4: JOURNAL ENTRIES & TRANSACTIONS
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(LEDGER_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(LEDGER_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 5: BUDGETS
        // ============================================================
        db.execute_unprepared(BUDGETS_SQL).await?;
        db.execute_unprepared(BUDGET_ITEMS_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE');

CREATE TYPE account_category AS ENUM (
    'CASH',
    'BANK',
    'ACCOUNTS_RECEIVABLE',
    'INVENTORY',
    'FIXED_ASSET',
    'EQUIPMENT',
    'ACCOUNTS_PAYABLE',
    'ACCRUED_LIABILITY',
    'LOAN',
    'OWNER_EQUITY',
    'RETAINED_EARNINGS',
    'SALES_REVENUE',
    'SERVICE_REVENUE',
    'OTHER_INCOME',
    'COST_OF_GOODS_SOLD',
    'OPERATING_EXPENSE',
    'PAYROLL',
    'RENT',
    'UTILITIES',
    'TAX',
    'OTHER'
);

CREATE TYPE transaction_type AS ENUM ('INCOME', 'EXPENSE', 'TRANSFER', 'ADJUSTMENT', 'REFUND');

CREATE TYPE transaction_status AS ENUM ('PENDING', 'COMPLETED', 'CANCELLED', 'FAILED');

CREATE TYPE journal_status AS ENUM ('draft', 'posted', 'cancelled');

CREATE TYPE budget_status AS ENUM ('draft', 'active', 'closed');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    code VARCHAR(20) NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    account_type account_type NOT NULL,
    category account_category NOT NULL,
    parent_id UUID REFERENCES accounts(id),
    is_active BOOLEAN NOT NULL DEFAULT true,
    is_system BOOLEAN NOT NULL DEFAULT false,
    opening_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    current_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    currency CHAR(3) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_accounts_tenant_code UNIQUE (tenant_id, code),
    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_tenant_type ON accounts(tenant_id, account_type);
CREATE INDEX idx_accounts_tenant_category ON accounts(tenant_id, category) WHERE is_active = true;
CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
";

const FINANCIAL_PERIODS_SQL: &str = r"
CREATE TABLE financial_periods (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name VARCHAR(100) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    is_closed BOOLEAN NOT NULL DEFAULT false,
    closed_at TIMESTAMPTZ,
    closed_by UUID,
    total_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_expenses NUMERIC(19, 4) NOT NULL DEFAULT 0,
    net_income NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_period_dates CHECK (end_date > start_date),
    CONSTRAINT chk_period_closed CHECK (NOT is_closed OR closed_at IS NOT NULL)
);

CREATE INDEX idx_periods_tenant_dates ON financial_periods(tenant_id, start_date, end_date);
CREATE INDEX idx_periods_closed ON financial_periods(tenant_id, start_date) WHERE is_closed = true;
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    number VARCHAR(50) NOT NULL,
    entry_date DATE NOT NULL,
    description TEXT NOT NULL,
    status journal_status NOT NULL DEFAULT 'draft',
    posted BOOLEAN NOT NULL DEFAULT false,
    posted_at TIMESTAMPTZ,
    posted_by UUID,
    cancelled_at TIMESTAMPTZ,
    cancelled_by UUID,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_journal_entries_tenant_number UNIQUE (tenant_id, number),
    CONSTRAINT chk_posted_flag CHECK (posted = (status = 'posted'))
);

CREATE INDEX idx_journal_entries_tenant_date ON journal_entries(tenant_id, entry_date DESC);
CREATE INDEX idx_journal_entries_draft ON journal_entries(tenant_id) WHERE status = 'draft';
";

const LEDGER_TRANSACTIONS_SQL: &str = r"
CREATE TABLE ledger_transactions (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    number VARCHAR(50) NOT NULL,
    transaction_date DATE NOT NULL,
    transaction_type transaction_type NOT NULL,
    status transaction_status NOT NULL DEFAULT 'COMPLETED',
    debit_account_id UUID NOT NULL REFERENCES accounts(id),
    credit_account_id UUID NOT NULL REFERENCES accounts(id),
    amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    description VARCHAR(500) NOT NULL,
    reference_kind VARCHAR(30),
    reference_id VARCHAR(100),
    journal_entry_id UUID REFERENCES journal_entries(id),
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_ledger_transactions_tenant_number UNIQUE (tenant_id, number),
    CONSTRAINT chk_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_distinct_sides CHECK (debit_account_id <> credit_account_id),
    CONSTRAINT chk_reference_pair CHECK ((reference_kind IS NULL) = (reference_id IS NULL))
);

CREATE INDEX idx_ltx_tenant_date ON ledger_transactions(tenant_id, transaction_date DESC, created_at DESC);
CREATE INDEX idx_ltx_debit_account ON ledger_transactions(debit_account_id, transaction_date);
CREATE INDEX idx_ltx_credit_account ON ledger_transactions(credit_account_id, transaction_date);
CREATE INDEX idx_ltx_journal_entry ON ledger_transactions(journal_entry_id) WHERE journal_entry_id IS NOT NULL;
";

const LEDGER_SEQUENCES_SQL: &str = r"
CREATE TABLE ledger_sequences (
    tenant_id UUID NOT NULL,
    name VARCHAR(20) NOT NULL,
    value BIGINT NOT NULL,
    PRIMARY KEY (tenant_id, name),
    CONSTRAINT chk_sequence_positive CHECK (value > 0)
);
";

const BUDGETS_SQL: &str = r"
CREATE TABLE budgets (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    period_id UUID REFERENCES financial_periods(id),
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    total_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    allocated_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    spent_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    remaining_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    status budget_status NOT NULL DEFAULT 'draft',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_dates CHECK (end_date >= start_date)
);

CREATE INDEX idx_budgets_tenant_start ON budgets(tenant_id, start_date DESC);
";

const BUDGET_ITEMS_SQL: &str = r"
CREATE TABLE budget_items (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    budgeted_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    allocated_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    spent_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    remaining_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_budget_items_budget_account UNIQUE (budget_id, account_id)
);

CREATE INDEX idx_budget_items_account ON budget_items(account_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_posted_transaction_change
-- Transactions of a posted journal entry are frozen
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_posted_transaction_change()
RETURNS TRIGGER AS $$
DECLARE
    entry_status journal_status;
BEGIN
    IF OLD.journal_entry_id IS NULL THEN
        IF TG_OP = 'DELETE' THEN
            RETURN OLD;
        END IF;
        RETURN NEW;
    END IF;

    SELECT status INTO entry_status
    FROM journal_entries
    WHERE id = OLD.journal_entry_id;

    IF entry_status = 'posted' THEN
        RAISE EXCEPTION 'Transaction % belongs to posted journal entry %',
            OLD.id, OLD.journal_entry_id;
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_transaction_change
BEFORE UPDATE OR DELETE ON ledger_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_posted_transaction_change();

-- ============================================================
-- FUNCTION: prevent_closed_period_reopen
-- A closed period stays closed
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_closed_period_reopen()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.is_closed AND NOT NEW.is_closed THEN
        RAISE EXCEPTION 'Financial period % is closed', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_closed_period_reopen
BEFORE UPDATE ON financial_periods
FOR EACH ROW
EXECUTE FUNCTION prevent_closed_period_reopen();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_closed_period_reopen ON financial_periods;
DROP TRIGGER IF EXISTS trg_prevent_posted_transaction_change ON ledger_transactions;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_closed_period_reopen();
DROP FUNCTION IF EXISTS prevent_posted_transaction_change();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS budget_items CASCADE;
DROP TABLE IF EXISTS budgets CASCADE;
DROP TABLE IF EXISTS ledger_sequences CASCADE;
DROP TABLE IF EXISTS ledger_transactions CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS financial_periods CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

-- Drop enums
DROP TYPE IF EXISTS budget_status CASCADE;
DROP TYPE IF EXISTS journal_status CASCADE;
DROP TYPE IF EXISTS transaction_status CASCADE;
DROP TYPE IF EXISTS transaction_type CASCADE;
DROP TYPE IF EXISTS account_category CASCADE;
DROP TYPE IF EXISTS account_type CASCADE;
";
