//! Override and inheritance relations between check specs, and the merge
//! operators that combine them. Merges never mutate their inputs.

use packguard_types::{CheckSpec, ConfigMap};

/// Returns true if `spec` overrides `base`.
///
/// Neither side may require inheritance, both must be named, and either the
/// names match exactly (explicit override allowing a different impl) or
/// `spec` is abstract and `base`'s name ends with `"/" + spec.name`
/// (implicit override for skipping or merging config).
pub fn overrides(spec: &CheckSpec, base: &CheckSpec) -> bool {
    spec.is_named()
        && base.is_named()
        && !spec.must_inherit()
        && !base.must_inherit()
        && (base.name_or_empty() == spec.name_or_empty()
            || (spec.is_abstract() && has_name_suffix(base.name_or_empty(), spec.name_or_empty())))
}

/// Returns true if `spec` names `template` in its template attribute.
///
/// `template` must itself be resolvable (named, not template-bearing), and
/// a spec never inherits through its own name.
pub fn inherits(spec: &CheckSpec, template: &CheckSpec) -> bool {
    spec.must_inherit()
        && !template.must_inherit()
        && spec.template.as_deref() != spec.name.as_deref()
        && template.is_named()
        && names_template(spec, template)
}

/// True when `template`'s name matches `spec`'s template reference, either
/// exactly or as a `"/"`-separated suffix.
pub fn names_template(spec: &CheckSpec, template: &CheckSpec) -> bool {
    let reference = spec.template.as_deref().unwrap_or("");
    template.name_or_empty() == reference
        || has_name_suffix(template.name_or_empty(), reference)
}

fn has_name_suffix(name: &str, suffix: &str) -> bool {
    !suffix.is_empty() && name.ends_with(&format!("/{suffix}"))
}

/// Overlay-merge `spec` onto `base`: the result keeps `base`'s name, skips
/// when either side skips, takes `spec`'s impl (or inline script) when
/// present, and shallow-merges `spec`'s config keys over `base`'s.
pub fn overlay_merge(spec: &CheckSpec, base: &CheckSpec) -> CheckSpec {
    let mut composite = base_composite(spec, base);
    composite.skip = spec.skip || base.skip;
    composite
}

/// Inherit-merge `spec` from template `base`: like an overlay, except the
/// result takes `spec`'s name when present and `spec`'s skip flag alone.
pub fn inherit_merge(spec: &CheckSpec, base: &CheckSpec) -> CheckSpec {
    let mut composite = base_composite(spec, base);
    composite.name = spec.name.clone().or_else(|| base.name.clone());
    composite.skip = spec.skip;
    composite
}

// Common composition: only one of impl / inlineScript survives in the
// composite, so downstream resolution never has to pick between them.
fn base_composite(spec: &CheckSpec, base: &CheckSpec) -> CheckSpec {
    let mut composite = base.clone();
    if spec.inline_script.is_some() {
        composite.inline_script = spec.inline_script.clone();
        composite.inline_engine = spec.inline_engine.clone();
        composite.impl_ref = None;
    } else if !spec.is_abstract() {
        composite.impl_ref = spec.impl_ref.clone();
        composite.inline_script = None;
        composite.inline_engine = None;
    }
    composite.config = merge_config(&base.config, &spec.config);
    composite
}

/// Shallow-merge `overlay`'s entries into `base`, replacing values for
/// duplicate keys.
pub fn merge_config(base: &ConfigMap, overlay: &ConfigMap) -> ConfigMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
