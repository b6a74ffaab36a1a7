//! Traversal of a bean graph for one validation call.
//!
//! A [`Traversal`] owns the per-call [`ValidationContext`] and walks beans in
//! group order:
//!
//! 1. plain groups: the constraints of every group, then the cascades of
//!    every group;
//! 2. sequences: group by group, stopping at the first group that produced
//!    violations (including violations found below cascaded elements).
//!
//! `Default` is special: every type of the bean's hierarchy that redefines
//! its default group sequence gets that sequence substituted for the
//! constraints it hosts.

use crate::core::bean::{bean_identity, BeanRef};
use crate::core::context::ValidationContext;
use crate::core::error::VerityResult;
use crate::core::path::Path;
use crate::core::types::{TypeName, TypeRef, Value};
use crate::engine::constraint_tree::ConstraintTree;
use crate::engine::interpolation::MessageInterpolator;
use crate::engine::violation::Violation;
use crate::extraction::{ValueExtractorRegistry, MAP_VALUE_TYPE_ARGUMENT};
use crate::groups::{GroupId, GroupOrder};
use crate::metadata::type_metadata::{
    CascadingMetadata, DefaultGroupSequence, ElementKind, ElementMetadata, ExecutableMetadata, MetaConstraint,
    TypeMetadata,
};
use crate::metadata::{DescriptorId, MetadataManager};
use crate::validators::ValidatorResolver;
use std::collections::HashSet;

/// Shared, immutable collaborators of a traversal.
#[derive(Clone, Copy)]
pub(crate) struct Services<'a> {
    pub metadata: &'a MetadataManager,
    pub resolver: &'a ValidatorResolver,
    pub extractors: &'a ValueExtractorRegistry,
    pub interpolator: &'a dyn MessageInterpolator,
}

type ConstraintFilter<'f> = &'f dyn Fn(&MetaConstraint) -> bool;

/// State of one validation call.
pub(crate) struct Traversal<'a> {
    services: Services<'a>,
    ctx: ValidationContext,
    root_bean: Option<BeanRef>,
    root_type: TypeName,
    cascade: bool,
    only_property: Option<String>,
    provided_value: Option<Value>,
}

impl<'a> Traversal<'a> {
    pub fn new(
        services: Services<'a>,
        fail_fast: bool,
        fail_fast_on_property: bool,
        root_bean: Option<BeanRef>,
        root_type: TypeName,
    ) -> Self {
        Self {
            services,
            ctx: ValidationContext::new(fail_fast, fail_fast_on_property),
            root_bean,
            root_type,
            cascade: true,
            only_property: None,
            provided_value: None,
        }
    }

    /// Restrict the traversal to one property, without cascading. With a
    /// `value`, that value is validated instead of the bean's.
    pub fn restricted_to(mut self, property: impl Into<String>, value: Option<Value>) -> Self {
        self.cascade = false;
        self.only_property = Some(property.into());
        self.provided_value = value;
        self
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Validate a bean (or, for value validation, no bean) located at `path`.
    pub fn run_bean(
        mut self,
        bean: Option<&BeanRef>,
        meta: &TypeMetadata,
        path: &Path,
        order: &GroupOrder,
    ) -> VerityResult<Vec<Violation>> {
        self.validate_bean_in_order(bean, meta, path, order)?;
        Ok(self.ctx.into_violations())
    }

    /// Validate the arguments of a method call.
    pub fn run_parameters(
        mut self,
        bean: &BeanRef,
        meta: &TypeMetadata,
        executable: &ExecutableMetadata,
        arguments: &[Value],
        order: &GroupOrder,
    ) -> VerityResult<Vec<Violation>> {
        let mut base = Path::root();
        base.add_method_node(executable.name());

        let elements: Vec<(&ElementMetadata, Path, Value)> = executable
            .parameters()
            .iter()
            .map(|parameter| {
                let index = match parameter.kind() {
                    ElementKind::Parameter { index } => index,
                    _ => 0,
                };
                let mut path = base.clone();
                path.add_parameter_node(parameter.name());
                let value = arguments.get(index).cloned().unwrap_or(Value::Null);
                (parameter, path, value)
            })
            .collect();

        self.validate_elements(bean, meta, &elements, order)?;
        Ok(self.ctx.into_violations())
    }

    /// Validate the value returned by a method call.
    pub fn run_return_value(
        mut self,
        bean: &BeanRef,
        meta: &TypeMetadata,
        executable: &ExecutableMetadata,
        value: Value,
        order: &GroupOrder,
    ) -> VerityResult<Vec<Violation>> {
        let Some(return_value) = executable.return_value() else {
            return Ok(Vec::new());
        };
        let mut path = Path::root();
        path.add_method_node(executable.name());
        path.add_return_value_node();

        self.validate_elements(bean, meta, &[(return_value, path, value)], order)?;
        Ok(self.ctx.into_violations())
    }

    // ========================================================================
    // Beans
    // ========================================================================

    fn validate_bean_in_order(
        &mut self,
        bean: Option<&BeanRef>,
        meta: &TypeMetadata,
        path: &Path,
        order: &GroupOrder,
    ) -> VerityResult<()> {
        if !meta.is_constrained() {
            return Ok(());
        }
        let identity = bean.map(bean_identity).unwrap_or(0);

        if order.sequence_count() > 0 {
            if let Some(sequence) = self.default_sequence_for(meta, bean)? {
                order.assert_default_group_sequence_is_expandable(&sequence)?;
            }
        }

        for group in order.groups() {
            self.ctx.mark_processed(identity, group.id(), path);
            self.validate_group(bean, meta, path, group.id())?;
            if self.ctx.should_stop() {
                return Ok(());
            }
        }
        if let (true, Some(bean)) = (self.cascade, bean) {
            for group in order.groups() {
                self.validate_cascades(bean, meta, path, group.id())?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
        }
        if path.is_root() && self.ctx.failed_root_member().is_some() {
            return Ok(());
        }

        for sequence in order.sequences() {
            for group in sequence.groups() {
                let before = self.ctx.violation_count();
                self.ctx.mark_processed(identity, group.id(), path);
                self.validate_group(bean, meta, path, group.id())?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
                if let (true, Some(bean)) = (self.cascade, bean) {
                    self.validate_cascades(bean, meta, path, group.id())?;
                    if self.ctx.should_stop() {
                        return Ok(());
                    }
                }
                if self.ctx.violation_count() > before {
                    break;
                }
            }
            if path.is_root() && self.ctx.failed_root_member().is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn validate_group(
        &mut self,
        bean: Option<&BeanRef>,
        meta: &TypeMetadata,
        path: &Path,
        group: &GroupId,
    ) -> VerityResult<()> {
        if !group.is_default() {
            let redefined = meta.is_default_group_sequence_redefined();
            let filter = |c: &MetaConstraint| c.applies_to(group, meta.type_name(), redefined);
            return self.validate_meta_constraints(bean, meta, path, &filter);
        }

        let default = GroupId::default_group();
        for host_type in meta.hierarchy() {
            let host = self.services.metadata.type_metadata(host_type)?;

            if let Some(sequence) = self.default_sequence_for(&host, bean)? {
                // The sequence replaces Default for every constraint the host
                // type declares or inherits.
                for member in &sequence {
                    let before = self.ctx.violation_count();
                    let filter = |c: &MetaConstraint| {
                        host.hierarchy().contains(c.declaring_type()) && c.applies_to(member, host_type, true)
                    };
                    self.validate_meta_constraints(bean, meta, path, &filter)?;
                    if self.ctx.should_stop() || self.ctx.violation_count() > before {
                        break;
                    }
                }
                return Ok(());
            }

            let filter = |c: &MetaConstraint| c.declaring_type() == host_type && c.descriptor().belongs_to(&default);
            self.validate_meta_constraints(bean, meta, path, &filter)?;
            if self.ctx.should_stop() {
                break;
            }
        }
        Ok(())
    }

    /// The redefined default sequence of `host`, expanded. Providers are
    /// consulted on every call since they may answer per instance.
    fn default_sequence_for(&self, host: &TypeMetadata, bean: Option<&BeanRef>) -> VerityResult<Option<Vec<GroupId>>> {
        match host.default_group_sequence() {
            DefaultGroupSequence::Implicit => Ok(None),
            DefaultGroupSequence::Static(groups) => Ok(Some(groups.clone())),
            DefaultGroupSequence::Provider(provider) => {
                let declared = provider.default_group_sequence(bean);
                let order = self
                    .services
                    .metadata
                    .planner()
                    .default_order(host.type_name(), &declared)?;
                Ok(Some(order.flattened()))
            }
        }
    }

    fn validate_meta_constraints(
        &mut self,
        bean: Option<&BeanRef>,
        meta: &TypeMetadata,
        path: &Path,
        filter: ConstraintFilter<'_>,
    ) -> VerityResult<()> {
        let at_root = path.is_root();

        if self.only_property.is_none() && !(at_root && self.ctx.skips_root_member("")) {
            if at_root {
                self.ctx.set_current_root_member(Some(String::new()));
            }
            let value = bean.map(|b| Value::Bean(b.clone())).unwrap_or(Value::Null);
            let declared = TypeRef::named(meta.type_name().clone());
            for constraint in meta.class_constraints().iter().filter(|c| filter(c)) {
                self.evaluate(bean, constraint, &value, Some(&declared), path)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
        }

        for property in meta.properties() {
            if matches!(&self.only_property, Some(only) if only != property.name()) {
                continue;
            }
            if at_root {
                if self.ctx.skips_root_member(property.name()) {
                    continue;
                }
                self.ctx.set_current_root_member(Some(property.name().to_string()));
            }

            let property_path = path.with_property(property.name());
            let value = self.member_value(bean, property.name());
            for constraint in property.constraints().iter().filter(|c| filter(c)) {
                self.evaluate(bean, constraint, &value, property.declared_type(), &property_path)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
            self.validate_container_elements(bean, property.cascading(), &value, &property_path, filter)?;
            if self.ctx.should_stop() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Container-element constraints are claimed once at the container's
    /// path, then evaluated for every extracted element.
    fn validate_container_elements(
        &mut self,
        bean: Option<&BeanRef>,
        cascading: &CascadingMetadata,
        value: &Value,
        path: &Path,
        filter: ConstraintFilter<'_>,
    ) -> VerityResult<()> {
        let identity = bean.map(bean_identity).unwrap_or(0);
        let mut claimed = HashSet::new();
        self.claim_element_constraints(identity, cascading, path, filter, &mut claimed);
        if claimed.is_empty() {
            return Ok(());
        }
        self.validate_claimed_elements(bean, cascading, value, path, &claimed)
    }

    fn claim_element_constraints(
        &mut self,
        identity: usize,
        cascading: &CascadingMetadata,
        path: &Path,
        filter: ConstraintFilter<'_>,
        claimed: &mut HashSet<DescriptorId>,
    ) {
        for element in cascading.container_elements() {
            for constraint in element.constraints().iter().filter(|c| filter(c)) {
                let id = constraint.descriptor().id();
                if self.ctx.claim_constraint(identity, path, id) {
                    claimed.insert(id);
                }
            }
            self.claim_element_constraints(identity, element.cascading(), path, filter, claimed);
        }
    }

    fn validate_claimed_elements(
        &mut self,
        bean: Option<&BeanRef>,
        cascading: &CascadingMetadata,
        value: &Value,
        path: &Path,
        claimed: &HashSet<DescriptorId>,
    ) -> VerityResult<()> {
        for element in cascading.container_elements() {
            if element.constraints().is_empty() && element.cascading().container_elements().is_empty() {
                continue;
            }
            for extracted in self.services.extractors.extract(value, Some(element.type_argument()))? {
                let mut element_path = path.clone();
                element_path.add_container_element_node(
                    extracted.node_name.as_deref(),
                    &extracted.qualifier,
                    extracted.type_parameter.as_deref(),
                );
                for constraint in element
                    .constraints()
                    .iter()
                    .filter(|c| claimed.contains(&c.descriptor().id()))
                {
                    self.report(bean, constraint, &extracted.value, None, &element_path)?;
                    if self.ctx.should_stop() {
                        return Ok(());
                    }
                }
                self.validate_claimed_elements(bean, element.cascading(), &extracted.value, &element_path, claimed)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn member_value(&self, bean: Option<&BeanRef>, name: &str) -> Value {
        if let (Some(only), Some(value)) = (&self.only_property, &self.provided_value) {
            if only == name {
                return value.clone();
            }
        }
        bean.and_then(|b| b.property(name)).unwrap_or(Value::Null)
    }

    fn evaluate(
        &mut self,
        bean: Option<&BeanRef>,
        constraint: &MetaConstraint,
        value: &Value,
        declared_type: Option<&TypeRef>,
        path: &Path,
    ) -> VerityResult<()> {
        let identity = bean.map(bean_identity).unwrap_or(0);
        if !self.ctx.claim_constraint(identity, path, constraint.descriptor().id()) {
            return Ok(());
        }
        self.report(bean, constraint, value, declared_type, path)
    }

    /// Evaluate an already claimed constraint and record its violations.
    fn report(
        &mut self,
        bean: Option<&BeanRef>,
        constraint: &MetaConstraint,
        value: &Value,
        declared_type: Option<&TypeRef>,
        path: &Path,
    ) -> VerityResult<()> {
        let descriptor = constraint.descriptor();
        let tree = ConstraintTree {
            resolver: self.services.resolver,
            validators: self.services.metadata.validators(),
        };
        for failure in tree.evaluate(descriptor, value, declared_type, path)? {
            let mut violation_path = path.clone();
            if let Some(property) = &failure.property {
                violation_path.add_property_node(property.clone());
            }
            let message = self
                .services
                .interpolator
                .interpolate(&failure.template, &failure.descriptor, value);
            self.ctx.add_violation(Violation {
                root_bean: self.root_bean.clone(),
                leaf_bean: bean.cloned(),
                root_type: self.root_type.clone(),
                descriptor: failure.descriptor,
                message_template: failure.template,
                message,
                path: violation_path,
                invalid_value: value.clone(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Cascading
    // ========================================================================

    fn validate_cascades(&mut self, bean: &BeanRef, meta: &TypeMetadata, path: &Path, group: &GroupId) -> VerityResult<()> {
        let at_root = path.is_root();
        for property in meta.cascadables() {
            if at_root {
                if self.ctx.skips_root_member(property.name()) {
                    continue;
                }
                self.ctx.set_current_root_member(Some(property.name().to_string()));
            }
            let value = self.member_value(Some(bean), property.name());
            if value.is_null() {
                continue;
            }
            let property_path = path.with_property(property.name());
            self.cascade_value(property.cascading(), &value, &property_path, group)?;
            if self.ctx.should_stop() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn cascade_value(
        &mut self,
        cascading: &CascadingMetadata,
        value: &Value,
        path: &Path,
        group: &GroupId,
    ) -> VerityResult<()> {
        if cascading.is_cascading() {
            let converted = cascading.conversions().convert(group);
            match value {
                Value::Bean(bean) => self.cascade_bean(bean, path, &converted, group)?,
                container => {
                    // Cascading a map as a whole reaches its values only.
                    let type_argument = matches!(container, Value::Map(_)).then_some(MAP_VALUE_TYPE_ARGUMENT);
                    for extracted in self.services.extractors.extract(container, type_argument)? {
                        let Value::Bean(element) = &extracted.value else {
                            continue;
                        };
                        let mut element_path = path.clone();
                        element_path.add_container_element_node(
                            None,
                            &extracted.qualifier,
                            extracted.type_parameter.as_deref(),
                        );
                        self.cascade_bean(element, &element_path, &converted, group)?;
                        if self.ctx.should_stop() {
                            return Ok(());
                        }
                    }
                }
            }
            if self.ctx.should_stop() {
                return Ok(());
            }
        }

        for element in cascading.container_elements() {
            if !element.cascading().is_marked_for_traversal() {
                continue;
            }
            for extracted in self.services.extractors.extract(value, Some(element.type_argument()))? {
                if extracted.value.is_null() {
                    continue;
                }
                let mut element_path = path.clone();
                element_path.add_container_element_node(
                    None,
                    &extracted.qualifier,
                    extracted.type_parameter.as_deref(),
                );
                self.cascade_value(element.cascading(), &extracted.value, &element_path, group)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn cascade_bean(&mut self, bean: &BeanRef, path: &Path, converted: &GroupId, original: &GroupId) -> VerityResult<()> {
        let identity = bean_identity(bean);
        if self.ctx.is_bean_already_validated(identity, converted, path) {
            log::trace!("{} already validated for {} near '{}'", bean.bean_type(), converted, path);
            return Ok(());
        }
        self.ctx.mark_processed(identity, converted, path);

        let meta = self.services.metadata.type_metadata(&bean.bean_type())?;
        let order = self
            .services
            .metadata
            .planner()
            .plan_single(converted, converted != original)?;
        self.validate_bean_in_order(Some(bean), &meta, path, &order)
    }

    // ========================================================================
    // Executables
    // ========================================================================

    fn validate_elements(
        &mut self,
        bean: &BeanRef,
        meta: &TypeMetadata,
        elements: &[(&ElementMetadata, Path, Value)],
        order: &GroupOrder,
    ) -> VerityResult<()> {
        for group in order.groups() {
            self.validate_elements_for_group(bean, meta, elements, group.id())?;
            if self.ctx.should_stop() {
                return Ok(());
            }
        }
        for sequence in order.sequences() {
            for group in sequence.groups() {
                let before = self.ctx.violation_count();
                self.validate_elements_for_group(bean, meta, elements, group.id())?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
                if self.ctx.violation_count() > before {
                    break;
                }
            }
        }
        Ok(())
    }

    fn validate_elements_for_group(
        &mut self,
        bean: &BeanRef,
        meta: &TypeMetadata,
        elements: &[(&ElementMetadata, Path, Value)],
        group: &GroupId,
    ) -> VerityResult<()> {
        if group.is_default() {
            if let Some(sequence) = self.default_sequence_for(meta, Some(bean))? {
                for member in &sequence {
                    let before = self.ctx.violation_count();
                    self.validate_elements_in_group(bean, meta, elements, member)?;
                    if self.ctx.should_stop() || self.ctx.violation_count() > before {
                        break;
                    }
                }
                return Ok(());
            }
        }
        self.validate_elements_in_group(bean, meta, elements, group)
    }

    fn validate_elements_in_group(
        &mut self,
        bean: &BeanRef,
        meta: &TypeMetadata,
        elements: &[(&ElementMetadata, Path, Value)],
        group: &GroupId,
    ) -> VerityResult<()> {
        let redefined = meta.is_default_group_sequence_redefined();
        let filter = |c: &MetaConstraint| c.applies_to(group, meta.type_name(), redefined);

        for (element, path, value) in elements {
            if self.ctx.skips_root_member(element.name()) {
                continue;
            }
            self.ctx.set_current_root_member(Some(element.name().to_string()));

            for constraint in element.constraints().iter().filter(|c| filter(c)) {
                self.evaluate(Some(bean), constraint, value, element.declared_type(), path)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
            self.validate_container_elements(Some(bean), element.cascading(), value, path, &filter)?;
            if self.ctx.should_stop() {
                return Ok(());
            }
            if !value.is_null() {
                self.cascade_value(element.cascading(), value, path, group)?;
                if self.ctx.should_stop() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
