//! The execution context: the implementation module, its namespace in the
//! embedded interpreter, and the one long-lived implementation instance.
//!
//! The interpreter itself is initialised once per process. What Create
//! builds, and Destroy removes again, is the context's namespace:
//! the `bridge` module, the client path entry on `sys.path`, the
//! imported implementation module and every module it loaded from the
//! client path.

use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};
use tracing::{debug, error, info, warn};

use crate::arbiter::{ManagedChunk, ManagedStream, OpenReply};
use crate::callbacks::{self, BridgeSurface};
use crate::config::{AddonConfig, RuntimeSettings};
use crate::error::{AddonStatus, BridgeError, BridgeResult, MarshalError};
use crate::marshal::{config_mapping, is_true, payload_value, settle, to_int, to_text, tuple_items};

/// What Create added to the interpreter, so Destroy can take it out again.
#[derive(Debug, Clone)]
struct Namespace {
    module: String,
    client_path: String,
}

impl Namespace {
    fn remove(&self, py: Python<'_>) {
        if let Err(e) = self.try_remove(py) {
            warn!("Could not fully remove implementation namespace: {}", e);
        }
    }

    fn try_remove(&self, py: Python<'_>) -> PyResult<()> {
        let sys = py.import("sys")?;
        let modules = sys.getattr("modules")?.downcast_into::<PyDict>()?;
        if modules.contains(self.module.as_str())? {
            modules.del_item(self.module.as_str())?;
        }
        let loaded = self.loaded_from_client_path(&modules);
        for name in &loaded {
            modules.del_item(name.as_str())?;
        }
        if !loaded.is_empty() {
            debug!("Removed {} modules loaded from {}", loaded.len(), self.client_path);
        }
        callbacks::uninstall(py)?;

        let path = sys.getattr("path")?;
        if path.contains(self.client_path.as_str())? {
            path.call_method1("remove", (self.client_path.as_str(),))?;
        }
        Ok(())
    }

    /// Names of `sys.modules` entries whose source file lies under the client path.
    fn loaded_from_client_path(&self, modules: &Bound<'_, PyDict>) -> Vec<String> {
        if self.client_path.is_empty() {
            return Vec::new();
        }
        let root = Path::new(&self.client_path);
        let real_root = root.canonicalize().ok();
        let under_root = |file: &Path| {
            file.starts_with(root)
                || real_root.as_ref().is_some_and(|real| {
                    file.canonicalize().is_ok_and(|file| file.starts_with(real))
                })
        };

        modules
            .iter()
            .filter_map(|(name, module)| {
                let file: String = module.getattr("__file__").ok()?.extract().ok()?;
                let name: String = name.extract().ok()?;
                under_root(Path::new(&file)).then_some(name)
            })
            .collect()
    }
}

/// The isolated runtime state owned by the add-on.
pub struct ExecutionContext {
    namespace: Namespace,
    instance: Py<PyAny>,
}

impl ExecutionContext {
    /// Register the surface, import the implementation and obtain its instance.
    ///
    /// On failure everything already added to the interpreter is removed.
    pub fn create(
        py: Python<'_>,
        config: &AddonConfig,
        settings: &RuntimeSettings,
        surface: BridgeSurface,
    ) -> BridgeResult<Self> {
        let namespace = Namespace {
            module: settings.module.clone(),
            client_path: config.client_path.clone(),
        };

        match Self::load(py, &namespace, settings, surface) {
            Ok(instance) => Ok(Self {
                namespace,
                instance: instance.unbind(),
            }),
            Err(e) => {
                namespace.remove(py);
                Err(e)
            }
        }
    }

    fn load<'py>(
        py: Python<'py>,
        namespace: &Namespace,
        settings: &RuntimeSettings,
        surface: BridgeSurface,
    ) -> BridgeResult<Bound<'py, PyAny>> {
        callbacks::install(py, surface).map_err(|e| {
            error!("Could not register the bridge module: {}", e);
            BridgeError::RegistrationFailure(e.to_string())
        })?;

        let sys_path = settle(py, "sys.path", py.import("sys").and_then(|sys| sys.getattr("path")))?;
        settle(
            py,
            "sys.path",
            sys_path.call_method1("append", (namespace.client_path.as_str(),)),
        )?;
        debug!("Added '{}' to sys.path", namespace.client_path);

        // A previous context may have imported from another client path.
        settle(
            py,
            "importlib",
            py.import("importlib")
                .and_then(|importlib| importlib.call_method0("invalidate_caches")),
        )?;

        let module = py.import(namespace.module.as_str()).map_err(|e| {
            error!(
                "Failed to import implementation module '{}': {}",
                namespace.module, e
            );
            BridgeError::import_failure(namespace.module.as_str(), e.to_string())
        })?;

        info!(module = %namespace.module, "Handing over to Python");
        settle(
            py,
            "getInstance",
            module
                .getattr(settings.factory.as_str())
                .and_then(|factory| factory.call0()),
        )
    }

    /// Hand the configuration mapping to `ADDON_Create` and read back its status.
    pub fn handshake(&self, py: Python<'_>, config: &AddonConfig) -> BridgeResult<AddonStatus> {
        let mapping = settle(
            py,
            "ADDON_Create",
            config_mapping(py, config).map(|mapping| mapping.into_any()),
        )?;
        let reply = settle(
            py,
            "ADDON_Create",
            self.instance(py).call_method1("ADDON_Create", (mapping,)),
        )?;
        Ok(AddonStatus::from_code(to_int("ADDON_Create", &reply)?))
    }

    pub fn instance<'py>(&self, py: Python<'py>) -> &Bound<'py, PyAny> {
        self.instance.bind(py)
    }

    /// Call a method without arguments and settle the outcome.
    pub fn call0<'py>(&self, py: Python<'py>, method: &'static str) -> BridgeResult<Bound<'py, PyAny>> {
        settle(py, method, self.instance(py).call_method0(method))
    }

    /// The implementation's live-stream methods.
    pub fn stream<'a, 'py>(&'a self, py: Python<'py>) -> ImplementationStream<'a, 'py> {
        ImplementationStream { py, context: self }
    }

    /// Drop the instance and remove the namespace.
    pub fn teardown(self, py: Python<'_>) {
        let Self { namespace, instance } = self;
        drop(instance);
        namespace.remove(py);
        info!(module = %namespace.module, "Execution context torn down");
    }
}

/// Interpret the reply of `OpenLiveStream`.
///
/// A bare value is a managed stream, opened only if it is `True`. A tuple
/// whose first item is `True` and that carries a second item asks for
/// native host I/O on that file name.
pub fn open_reply(reply: &Bound<'_, PyAny>) -> BridgeResult<OpenReply> {
    let Ok(tuple) = reply.downcast::<PyTuple>() else {
        return Ok(OpenReply::Managed(is_true(reply)));
    };
    let items: Vec<_> = tuple.iter().collect();
    match items.as_slice() {
        [first, file, ..] if is_true(first) => {
            Ok(OpenReply::Native(to_text("OpenLiveStream", file)?))
        }
        [first, ..] => Ok(OpenReply::Managed(is_true(first))),
        [] => Ok(OpenReply::Managed(false)),
    }
}

/// [`ManagedStream`] backed by the implementation instance.
///
/// Only constructed while the gate is held.
pub struct ImplementationStream<'a, 'py> {
    py: Python<'py>,
    context: &'a ExecutionContext,
}

impl ImplementationStream<'_, '_> {
    fn int_call(&self, method: &'static str) -> BridgeResult<i64> {
        let reply = self.context.call0(self.py, method)?;
        to_int(method, &reply)
    }

    fn bool_call(&self, method: &'static str) -> BridgeResult<bool> {
        let reply = self.context.call0(self.py, method)?;
        Ok(is_true(&reply))
    }
}

impl ManagedStream for ImplementationStream<'_, '_> {
    fn open(&mut self, channel_uid: u32) -> BridgeResult<OpenReply> {
        let reply = settle(
            self.py,
            "OpenLiveStream",
            self.context
                .instance(self.py)
                .call_method1("OpenLiveStream", (channel_uid,)),
        )?;
        open_reply(&reply)
    }

    fn read(&mut self, size: usize) -> BridgeResult<ManagedChunk> {
        let reply = settle(
            self.py,
            "ReadLiveStream",
            self.context
                .instance(self.py)
                .call_method1("ReadLiveStream", (size,)),
        )?;
        let items = tuple_items("ReadLiveStream", &reply, 1, "(bytesRead, bytes)")?;
        let bytes_read = to_int("ReadLiveStream", &items[0])?;
        if bytes_read <= 0 {
            return Ok(ManagedChunk::empty(bytes_read));
        }
        let payload = items
            .get(1)
            .and_then(payload_value)
            .ok_or_else(|| MarshalError::shape("ReadLiveStream", "(bytesRead, bytes)"))?;
        Ok(ManagedChunk {
            bytes_read,
            payload,
        })
    }

    fn seek(&mut self, position: i64, whence: i32) -> BridgeResult<i64> {
        let reply = settle(
            self.py,
            "SeekLiveStream",
            self.context
                .instance(self.py)
                .call_method1("SeekLiveStream", (position, whence)),
        )?;
        to_int("SeekLiveStream", &reply)
    }

    fn position(&mut self) -> BridgeResult<i64> {
        self.int_call("PositionLiveStream")
    }

    fn length(&mut self) -> BridgeResult<i64> {
        self.int_call("LengthLiveStream")
    }

    fn close(&mut self) -> BridgeResult<()> {
        self.context.call0(self.py, "CloseLiveStream").map(|_| ())
    }

    fn can_pause(&mut self) -> BridgeResult<bool> {
        self.bool_call("CanPauseStream")
    }

    fn can_seek(&mut self) -> BridgeResult<bool> {
        self.bool_call("CanSeekStream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CallScope;
    use crate::test_support::{serial, with_python, write_module, MockHost};
    use std::ffi::CString;
    use std::sync::Arc;
    use tempfile::tempdir;

    const MINIMAL: &str = "\
class Impl:
    def ADDON_Create(self, config):
        self.config = config
        return 3 if config['epgMaxDays'] == 0 else 0

def getInstance():
    return Impl()
";

    fn surface() -> BridgeSurface {
        BridgeSurface::new(Arc::new(MockHost::default()), Arc::new(CallScope::default()))
    }

    fn settings(module: &str) -> RuntimeSettings {
        RuntimeSettings {
            module: module.to_string(),
            ..RuntimeSettings::default()
        }
    }

    fn in_sys_modules(py: Python<'_>, name: &str) -> bool {
        py.import("sys")
            .unwrap()
            .getattr("modules")
            .unwrap()
            .contains(name)
            .unwrap()
    }

    #[test]
    fn create_handshake_and_teardown() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        write_module(dir.path(), "rt_minimal", MINIMAL);
        let config = AddonConfig::new("/user", dir.path().to_string_lossy(), 7);

        with_python(|py| {
            let context =
                ExecutionContext::create(py, &config, &settings("rt_minimal"), surface()).unwrap();
            assert_eq!(context.handshake(py, &config).unwrap(), AddonStatus::Ok);
            assert!(in_sys_modules(py, "rt_minimal"));
            assert!(in_sys_modules(py, "bridge"));

            let seen = context.instance(py).getattr("config").unwrap();
            let seen = crate::marshal::FieldReader::new(&seen, "Config");
            assert_eq!(seen.text("userPath").unwrap(), "/user");
            assert_eq!(seen.int::<i32>("epgMaxDays").unwrap(), 7);

            context.teardown(py);
            assert!(!in_sys_modules(py, "rt_minimal"));
            assert!(!in_sys_modules(py, "bridge"));
            let path = py.import("sys").unwrap().getattr("path").unwrap();
            assert!(!path.contains(config.client_path.as_str()).unwrap());
        });
    }

    #[test]
    fn teardown_drops_modules_imported_from_client_path() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        write_module(
            dir.path(),
            "rt_helper",
            "STATE = {'created': 0}\n\ndef bump():\n    STATE['created'] += 1\n    return STATE['created']\n",
        );
        write_module(
            dir.path(),
            "rt_sibling",
            "import rt_helper\n\nclass Impl:\n    def ADDON_Create(self, config):\n        return rt_helper.bump()\n\ndef getInstance():\n    return Impl()\n",
        );
        let config = AddonConfig::new("/user", dir.path().to_string_lossy(), 7);

        with_python(|py| {
            for _ in 0..2 {
                let context =
                    ExecutionContext::create(py, &config, &settings("rt_sibling"), surface())
                        .unwrap();
                assert_eq!(
                    context.handshake(py, &config).unwrap(),
                    AddonStatus::LostConnection
                );
                assert!(in_sys_modules(py, "rt_helper"));
                context.teardown(py);
                assert!(!in_sys_modules(py, "rt_helper"));
            }
            assert!(in_sys_modules(py, "os"));
        });
    }

    #[test]
    fn handshake_status_comes_from_implementation() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        write_module(dir.path(), "rt_status", MINIMAL);
        let config = AddonConfig::new("/user", dir.path().to_string_lossy(), 0);

        with_python(|py| {
            let context =
                ExecutionContext::create(py, &config, &settings("rt_status"), surface()).unwrap();
            assert_eq!(
                context.handshake(py, &config).unwrap(),
                AddonStatus::NeedSettings
            );
            context.teardown(py);
        });
    }

    #[test]
    fn missing_module_is_an_import_failure() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        let config = AddonConfig::new("/user", dir.path().to_string_lossy(), 7);

        with_python(|py| {
            let err = ExecutionContext::create(py, &config, &settings("rt_absent"), surface())
                .err()
                .unwrap();
            assert!(matches!(err, BridgeError::ImportFailure { .. }));
            assert!(!in_sys_modules(py, "bridge"));
        });
    }

    #[test]
    fn factory_fault_is_a_runtime_fault() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        write_module(
            dir.path(),
            "rt_broken",
            "def getInstance():\n    raise RuntimeError('backend down')\n",
        );
        let config = AddonConfig::new("/user", dir.path().to_string_lossy(), 7);

        with_python(|py| {
            let err = ExecutionContext::create(py, &config, &settings("rt_broken"), surface())
                .err()
                .unwrap();
            assert!(err.is_runtime_fault());
            assert!(!in_sys_modules(py, "rt_broken"));
            assert!(PyErr::take(py).is_none());
        });
    }

    #[test]
    fn open_reply_shapes() {
        with_python(|py| {
            let reply = |expr: &str| {
                let code = CString::new(expr).unwrap();
                open_reply(&py.eval(&code, None, None).unwrap()).unwrap()
            };
            assert_eq!(reply("True"), OpenReply::Managed(true));
            assert_eq!(reply("False"), OpenReply::Managed(false));
            assert_eq!(reply("1"), OpenReply::Managed(false));
            assert_eq!(reply("(True,)"), OpenReply::Managed(true));
            assert_eq!(reply("(False, '/tmp/s.ts')"), OpenReply::Managed(false));
            assert_eq!(
                reply("(True, '/tmp/s.ts')"),
                OpenReply::Native("/tmp/s.ts".to_string())
            );
            assert_eq!(reply("()"), OpenReply::Managed(false));
        });
    }
}
