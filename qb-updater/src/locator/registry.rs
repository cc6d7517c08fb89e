use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryScope {
    Machine,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryView {
    Bits64,
    Bits32,
}

/// Every scope/view pair, in probing order.
pub const ALL_HIVES: [(RegistryScope, RegistryView); 4] = [
    (RegistryScope::Machine, RegistryView::Bits64),
    (RegistryScope::Machine, RegistryView::Bits32),
    (RegistryScope::User, RegistryView::Bits64),
    (RegistryScope::User, RegistryView::Bits32),
];

/// Read-only access to a hierarchical key/value store.
///
/// Missing keys and values are `Ok(None)` / an empty list, everything else
/// (access denied, wrong value type) is an error.
pub trait Registry: Send + Sync {
    /// Read a string value. An empty `value` names the key's default value.
    fn read_string(
        &self,
        scope: RegistryScope,
        view: RegistryView,
        key: &str,
        value: &str,
    ) -> io::Result<Option<String>>;

    fn subkeys(
        &self,
        scope: RegistryScope,
        view: RegistryView,
        key: &str,
    ) -> io::Result<Vec<String>>;
}

/// Registry of a host that has none.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl Registry for EmptyRegistry {
    fn read_string(
        &self,
        _scope: RegistryScope,
        _view: RegistryView,
        _key: &str,
        _value: &str,
    ) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn subkeys(
        &self,
        _scope: RegistryScope,
        _view: RegistryView,
        _key: &str,
    ) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(windows)]
pub use windows::WindowsRegistry;

#[cfg(windows)]
mod windows {
    use super::{Registry, RegistryScope, RegistryView};
    use std::io;
    use winreg::RegKey;
    use winreg::enums::{
        HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_32KEY, KEY_WOW64_64KEY,
    };

    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsRegistry;

    impl WindowsRegistry {
        fn open(scope: RegistryScope, view: RegistryView, key: &str) -> io::Result<Option<RegKey>> {
            let root = RegKey::predef(match scope {
                RegistryScope::Machine => HKEY_LOCAL_MACHINE,
                RegistryScope::User => HKEY_CURRENT_USER,
            });

            let view_flag = match view {
                RegistryView::Bits64 => KEY_WOW64_64KEY,
                RegistryView::Bits32 => KEY_WOW64_32KEY,
            };

            match root.open_subkey_with_flags(key, KEY_READ | view_flag) {
                Ok(key) => Ok(Some(key)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err),
            }
        }
    }

    impl Registry for WindowsRegistry {
        fn read_string(
            &self,
            scope: RegistryScope,
            view: RegistryView,
            key: &str,
            value: &str,
        ) -> io::Result<Option<String>> {
            let Some(key) = Self::open(scope, view, key)? else {
                return Ok(None);
            };

            match key.get_value::<String, _>(value) {
                Ok(v) => Ok(Some(v)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err),
            }
        }

        fn subkeys(
            &self,
            scope: RegistryScope,
            view: RegistryView,
            key: &str,
        ) -> io::Result<Vec<String>> {
            let Some(key) = Self::open(scope, view, key)? else {
                return Ok(Vec::new());
            };

            key.enum_keys().collect()
        }
    }
}

/// The registry of the machine we are running on.
pub fn host_registry() -> Arc<dyn Registry> {
    #[cfg(windows)]
    {
        Arc::new(WindowsRegistry)
    }

    #[cfg(not(windows))]
    {
        Arc::new(EmptyRegistry)
    }
}
