//! Address books (`contacts`): fetched asynchronously, then queried.

use std::sync::Arc;

use core_adapter::{
    payload_json, BridgeContext, BridgeError, Callbacks, CapabilityModule, DestroyReport,
    DualModeAdapter, Handle, HandleId, HandleKind, PendingCall, Result,
};
use serde::Serialize;
use serde_json::{json, Value};

pub const NAMESPACE: &str = "contacts";

/// Address book sources.
pub mod book_type {
    /// Contacts stored on the device
    pub const ADDRESSBOOK_PHONE: i64 = 0;
    /// Contacts stored on the SIM card
    pub const ADDRESSBOOK_SIM: i64 = 1;
}

/// Search options of [`AddressBook::find`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindOptions {
    /// Matches against contact fields; an empty list returns every contact.
    pub filter: Vec<ContactFilter>,
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactFilter {
    pub logic: String,
    pub field: String,
    pub value: String,
}

/// Address book capability.
#[derive(Debug, Clone)]
pub struct AddressBooks {
    module: CapabilityModule,
}

impl AddressBooks {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self {
            module: CapabilityModule::new(ctx, NAMESPACE, HandleKind::AddressBook),
        }
    }

    pub async fn is_supported(&self) -> bool {
        self.module.is_supported().await
    }

    fn fetch(&self, book_type: i64) -> Result<(DualModeAdapter<AddressBook>, Vec<Value>)> {
        if book_type != book_type::ADDRESSBOOK_PHONE && book_type != book_type::ADDRESSBOOK_SIM {
            return Err(BridgeError::InvalidArgument(format!(
                "unknown address book type {book_type}"
            )));
        }
        let ctx = Arc::clone(self.module.context());
        let adapter = self
            .module
            .fetch("getAddressBook")
            .map(move |handle| AddressBook::new(Arc::clone(&ctx), handle));
        Ok((adapter, vec![json!(book_type)]))
    }

    /// Opens the address book of `book_type`.
    pub fn get_address_book(&self, book_type: i64) -> Result<PendingCall<AddressBook>> {
        let (adapter, args) = self.fetch(book_type)?;
        Ok(adapter.call(args))
    }

    pub fn get_address_book_with(
        &self,
        book_type: i64,
        callbacks: Callbacks<AddressBook>,
    ) -> Result<()> {
        let (adapter, args) = self.fetch(book_type)?;
        adapter.call_with(args, callbacks);
        Ok(())
    }

    pub fn get(&self, id: &HandleId) -> Option<AddressBook> {
        self.module
            .lookup(id)
            .map(|handle| AddressBook::new(Arc::clone(self.module.context()), handle))
    }

    pub fn active_address_books_count(&self) -> usize {
        self.module.active_count()
    }

    pub fn active_address_book_ids(&self) -> Vec<HandleId> {
        self.module.active_ids()
    }

    pub fn close_all_address_books(&self) -> DestroyReport {
        self.module.close_all()
    }
}

/// An open address book.
#[derive(Debug, Clone)]
pub struct AddressBook {
    ctx: Arc<BridgeContext>,
    handle: Arc<Handle>,
}

impl AddressBook {
    fn new(ctx: Arc<BridgeContext>, handle: Arc<Handle>) -> Self {
        Self { ctx, handle }
    }

    pub fn id(&self) -> &HandleId {
        self.handle.id()
    }

    pub fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    fn find_args(&self, fields: &[&str], options: &FindOptions) -> Result<Vec<Value>> {
        self.handle.ensure_active()?;
        let options = serde_json::to_value(options)
            .map_err(|e| BridgeError::InvalidArgument(format!("invalid find options: {e}")))?;
        Ok(vec![json!(fields), options])
    }

    /// Finds contacts, returning the requested `fields` of each match.
    pub fn find(&self, fields: &[&str], options: &FindOptions) -> Result<PendingCall<Vec<Value>>> {
        let args = self.find_args(fields, options)?;
        Ok(self
            .ctx
            .handle_call(&self.handle, "find", payload_json::<Vec<Value>>)
            .call(args))
    }

    pub fn find_with(
        &self,
        fields: &[&str],
        options: &FindOptions,
        callbacks: Callbacks<Vec<Value>>,
    ) -> Result<()> {
        let args = self.find_args(fields, options)?;
        self.ctx
            .handle_call(&self.handle, "find", payload_json::<Vec<Value>>)
            .call_with(args, callbacks);
        Ok(())
    }

    /// Creates an unsaved contact record.
    pub fn create_contact(&self) -> Result<Value> {
        self.ctx.call_sync(&self.handle, "create", &[])
    }

    pub fn close(&self) -> bool {
        self.ctx.destroy(&self.handle)
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_destroyed()
    }
}
