//! The runtime prelude: helper functions emitted at the top of a chunk,
//! each only when something in the chunk uses it.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeUsage {
    pub export: bool,
    pub common_js: bool,
    pub import: bool,
    pub require: bool,
    pub to_module: bool,
    pub dynamic: bool,
}

impl RuntimeUsage {
    pub fn any(&self) -> bool {
        self.export || self.common_js || self.import || self.require || self.to_module || self.dynamic
    }

    pub fn use_import(&mut self) {
        self.import = true;
        self.to_module = true;
        self.require = true;
    }

    pub fn use_require(&mut self) {
        self.require = true;
    }

    pub fn use_dynamic(&mut self) {
        self.dynamic = true;
        self.use_import();
    }

    pub fn use_export(&mut self) {
        self.export = true;
    }

    /// Renders the used helpers, in a fixed order so output is stable.
    pub fn render(&self, has_modules_object: bool) -> Vec<String> {
        let mut out = Vec::new();
        if self.export {
            out.push(
                "var __defProp = Object.defineProperty;\n\
                 var __export = (target, all) => {\n\
                 \x20 for (var name in all)\n\
                 \x20   __defProp(target, name, { get: all[name], enumerable: true });\n\
                 \x20 return target;\n\
                 };\n"
                    .to_string(),
            );
        }
        if self.require {
            // the factory table itself is emitted by the printer
            if !has_modules_object {
                out.push("var __modules = {};\n".to_string());
            }
            out.push(
                "var __cache = {};\n\
                 var __require = (id) => {\n\
                 \x20 var mod = __cache[id];\n\
                 \x20 if (!mod) {\n\
                 \x20   mod = __cache[id] = { exports: {} };\n\
                 \x20   __modules[id](mod.exports, mod);\n\
                 \x20 }\n\
                 \x20 return mod.exports;\n\
                 };\n"
                    .to_string(),
            );
        }
        if self.to_module {
            out.push(
                "var __toModule = (mod) => {\n\
                 \x20 if (mod && mod.__esModule) return mod;\n\
                 \x20 var target = {};\n\
                 \x20 Object.defineProperty(target, \"default\", { value: mod, enumerable: true });\n\
                 \x20 for (var name in mod)\n\
                 \x20   if (name !== \"default\")\n\
                 \x20     Object.defineProperty(target, name, { get: () => mod[name], enumerable: true });\n\
                 \x20 return target;\n\
                 };\n"
                    .to_string(),
            );
        }
        if self.import {
            out.push("var __import = (id) => __toModule(__require(id));\n".to_string());
        }
        if self.common_js {
            out.push(
                "var __commonJS = (cb) => {\n\
                 \x20 var mod;\n\
                 \x20 return () => (mod || cb((mod = { exports: {} }).exports, mod), mod.exports);\n\
                 };\n"
                    .to_string(),
            );
        }
        if self.dynamic {
            out.push(
                "var __dynamic = (id) => Promise.resolve().then(() => __import(id));\n".to_string(),
            );
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::RuntimeUsage;

    #[test]
    fn unused_runtime_renders_nothing() {
        let usage = RuntimeUsage::default();
        assert!(usage.render(false).is_empty());
    }

    #[test]
    fn import_pulls_its_dependencies() {
        let mut usage = RuntimeUsage::default();
        usage.use_import();
        let rendered = usage.render(true).join("");
        assert!(rendered.contains("__import"));
        assert!(rendered.contains("__toModule"));
        assert!(rendered.contains("__require"));
        assert!(!rendered.contains("__export"));
        assert!(!rendered.contains("var __modules = {}"));
    }
}
