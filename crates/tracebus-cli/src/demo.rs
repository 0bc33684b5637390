//! Demo bounded context: a small account ledger
//!
//! Account commands (`open_account`, `deposit`, `withdraw`) are built by
//! their own factory and handled by `AccountHandler`. System commands
//! (`ping`, `noop`) go through a generic factory and tag-keyed handlers.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracebus_core::dispatch::HandleTypeInflector;
use tracebus_core::factory::{AllowedTypes, FactoryError, FactoryResult, InstanceFactory, PositionalArgs};
use tracebus_core::telemetry::OperationOptions;
use tracebus_core::tracebus_span::TraceContext;
use tracebus_core::{
    Command, CommandData, CommandFactoryChain, CommandHandler, HandlerFault, HandlerResult, InMemoryHandlerLocator,
    Message, Payload, ProcessUuid, Tracing,
};
use uuid::Uuid;

/// Positional layout shared by every demo command
pub mod position {
    pub const TAG: usize = 0;
    pub const PROCESS_UUID: usize = 1;
    pub const UUID: usize = 2;
    pub const PAYLOAD: usize = 3;
    pub const VERSION: usize = 4;
}

pub const OPEN_ACCOUNT: &str = "open_account";
pub const DEPOSIT: &str = "deposit";
pub const WITHDRAW: &str = "withdraw";
pub const PING: &str = "ping";
pub const NOOP: &str = "noop";

fn command_data(args: &PositionalArgs<'_>) -> FactoryResult<CommandData> {
    let data = CommandData::new(
        args.process_uuid(position::PROCESS_UUID)?,
        args.uuid(position::UUID)?,
        args.payload(position::PAYLOAD)?,
    );
    Ok(match args.version(position::VERSION)? {
        Some(version) => data.with_version(version),
        None => data,
    })
}

macro_rules! account_command {
    ($name:ident, $tag:expr) => {
        #[derive(Debug)]
        pub struct $name {
            data: CommandData,
            amount: i64,
        }

        impl $name {
            pub fn amount(&self) -> i64 {
                self.amount
            }
        }

        impl Message for $name {
            fn message_type(&self) -> &str {
                $tag
            }

            fn process_uuid(&self) -> Option<ProcessUuid> {
                self.data.process_uuid()
            }
        }

        impl Command for $name {
            fn uuid(&self) -> Option<Uuid> {
                self.data.uuid()
            }

            fn payload(&self) -> Option<&Payload> {
                self.data.payload()
            }

            fn version(&self) -> Option<u32> {
                self.data.version()
            }
        }
    };
}

account_command!(OpenAccount, OPEN_ACCOUNT);
account_command!(Deposit, DEPOSIT);
account_command!(Withdraw, WITHDRAW);

/// Builds account commands. `amount` is read from the payload; it is
/// optional for `open_account` and must be positive otherwise.
pub struct AccountCommandFactory {
    allowed: AllowedTypes,
}

impl Default for AccountCommandFactory {
    fn default() -> Self {
        Self {
            allowed: AllowedTypes::of([OPEN_ACCOUNT, DEPOSIT, WITHDRAW]),
        }
    }
}

impl AccountCommandFactory {
    fn amount(tag: &str, data: &CommandData, required: bool) -> FactoryResult<i64> {
        let amount = data.payload().and_then(|p| p.get("amount"));
        match amount {
            None if required => Err(FactoryError::invalid_arguments(tag, "payload field amount is missing")),
            None => Ok(0),
            Some(value) => match value.as_i64() {
                Some(amount) if amount > 0 || (!required && amount == 0) => Ok(amount),
                _ => Err(FactoryError::invalid_arguments(
                    tag,
                    format!("payload field amount must be a positive integer, got {}", value),
                )),
            },
        }
    }
}

impl InstanceFactory<dyn Command> for AccountCommandFactory {
    fn name(&self) -> &str {
        "accounts"
    }

    fn allowed_types(&self) -> &AllowedTypes {
        &self.allowed
    }

    fn build_from_positional(&self, args: &[Value]) -> FactoryResult<Box<dyn Command>> {
        let args = PositionalArgs::new(args);
        let tag = args.tag();
        let data = command_data(&args)?;

        match tag.as_str() {
            OPEN_ACCOUNT => {
                let amount = Self::amount(&tag, &data, false)?;
                Ok(Box::new(OpenAccount { data, amount }))
            }
            DEPOSIT => {
                let amount = Self::amount(&tag, &data, true)?;
                Ok(Box::new(Deposit { data, amount }))
            }
            WITHDRAW => {
                let amount = Self::amount(&tag, &data, true)?;
                Ok(Box::new(Withdraw { data, amount }))
            }
            _ => Err(FactoryError::FactoryNotFound(tag)),
        }
    }
}

/// A command that carries nothing beyond its tag and common data.
#[derive(Debug)]
pub struct SystemCommand {
    tag: String,
    data: CommandData,
}

impl Message for SystemCommand {
    fn message_type(&self) -> &str {
        &self.tag
    }

    fn process_uuid(&self) -> Option<ProcessUuid> {
        self.data.process_uuid()
    }
}

impl Command for SystemCommand {
    fn uuid(&self) -> Option<Uuid> {
        self.data.uuid()
    }

    fn payload(&self) -> Option<&Payload> {
        self.data.payload()
    }
}

pub struct SystemCommandFactory {
    allowed: AllowedTypes,
}

impl Default for SystemCommandFactory {
    fn default() -> Self {
        Self {
            allowed: AllowedTypes::of([PING, NOOP]),
        }
    }
}

impl InstanceFactory<dyn Command> for SystemCommandFactory {
    fn name(&self) -> &str {
        "system"
    }

    fn allowed_types(&self) -> &AllowedTypes {
        &self.allowed
    }

    fn build_from_positional(&self, args: &[Value]) -> FactoryResult<Box<dyn Command>> {
        let args = PositionalArgs::new(args);
        Ok(Box::new(SystemCommand {
            tag: args.tag(),
            data: command_data(&args)?,
        }))
    }
}

/// The demo chain: account commands first, then system commands.
pub fn factory_chain() -> CommandFactoryChain {
    CommandFactoryChain::named("demo")
        .with_factory(AccountCommandFactory::default())
        .with_factory(SystemCommandFactory::default())
}

/// In-memory balances keyed by account uuid.
#[derive(Debug, Default)]
pub struct Ledger {
    balances: Mutex<HashMap<Uuid, i64>>,
}

impl Ledger {
    pub fn balance(&self, account: &Uuid) -> Option<i64> {
        self.balances.lock().ok()?.get(account).copied()
    }

    fn apply(&self, account: Uuid, delta: i64, create: bool) -> Result<i64, HandlerFault> {
        let mut balances = self
            .balances
            .lock()
            .map_err(|_| HandlerFault::new("ledger lock poisoned"))?;

        let balance = match balances.get(&account) {
            Some(balance) => *balance,
            None if create => 0,
            None => return Err(HandlerFault::new(format!("account {} not found", account)).with_code(404)),
        };
        let next = balance + delta;
        if next < 0 {
            return Err(
                HandlerFault::new(format!("insufficient funds: balance {}, requested {}", balance, -delta))
                    .with_code(422),
            );
        }
        balances.insert(account, next);
        Ok(next)
    }
}

/// Applies account commands to the ledger.
pub struct AccountHandler {
    ledger: Arc<Ledger>,
    tracing: Tracing,
}

impl AccountHandler {
    pub fn new(ledger: Arc<Ledger>, tracing: Tracing) -> Self {
        Self {
            ledger,
            tracing: tracing.with_owner(std::any::type_name::<Self>()),
        }
    }
}

#[async_trait]
impl CommandHandler for AccountHandler {
    async fn handle(&self, ctx: TraceContext, command: &dyn Command) -> HandlerResult {
        let account = command.uuid().unwrap_or_else(Uuid::new_v4);
        let amount = command
            .payload()
            .and_then(|p| p.get("amount"))
            .and_then(Value::as_i64)
            .unwrap_or_default();

        let (delta, create) = match command.message_type() {
            OPEN_ACCOUNT => (amount, true),
            DEPOSIT => (amount, true),
            WITHDRAW => (-amount, false),
            other => return Err(HandlerFault::new(format!("unsupported account command {}", other)).with_code(400)),
        };

        let mut guard = self.tracing.start_guarded_span(
            &ctx,
            "apply",
            OperationOptions::new()
                .with_attribute("account", account.to_string())
                .with_attribute("delta", delta),
        );

        let result = self.ledger.apply(account, delta, create);
        if let Some(guard) = guard.as_mut() {
            match &result {
                Ok(_) => self.tracing.set_status_ok(guard.span_mut()),
                Err(fault) => self.tracing.record_exception(guard.span_mut(), fault),
            }
        }
        if let Some(guard) = guard {
            guard.finish();
        }

        let balance = result?;
        Ok(Some(json!({ "account": account, "balance": balance })))
    }
}

/// Answers `ping` with `pong`.
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, _ctx: TraceContext, command: &dyn Command) -> HandlerResult {
        Ok(Some(json!({ "pong": command.process_uuid().map(|p| p.to_string()) })))
    }
}

/// Accepts anything and returns nothing.
pub struct NoopHandler;

#[async_trait]
impl CommandHandler for NoopHandler {
    async fn handle(&self, _ctx: TraceContext, _command: &dyn Command) -> HandlerResult {
        Ok(None)
    }
}

/// Register the demo handlers. Handler spans are traced with `tracing`.
pub fn handler_locator(ledger: Arc<Ledger>, tracing: &Tracing) -> InMemoryHandlerLocator {
    let accounts: Arc<dyn CommandHandler> = Arc::new(AccountHandler::new(ledger, tracing.clone()));

    let mut locator = InMemoryHandlerLocator::new().with_inflector(HandleTypeInflector);
    locator.register::<OpenAccount>(Arc::clone(&accounts));
    locator.register::<Deposit>(Arc::clone(&accounts));
    locator.register::<Withdraw>(accounts);
    locator
        .with_tag_handler(PING, PingHandler)
        .with_tag_handler(NOOP, NoopHandler)
}
