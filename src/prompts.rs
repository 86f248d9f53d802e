//! Built-in prompt texts.
//!
//! Each of these can be overridden by a `prompts/<name>.yml` file carrying a
//! `system_prompt` field; see [`crate::registries::PromptRegistry`].

/// Behavioural preamble of the generation system turn.
pub const COMPONENT_SYSTEM_PROMPT: &str = r#"You are an AI Python developer assistant.
- You are building a KFP Pipeline component that takes an input and produces an output based on user requested actions.
- All components are designed to be run on Vertex AI Pipelines.
- The `google-cloud-aiplatform` and `openai` packages are already installed.
- Follow the user's instructions carefully & to the letter.
- At all times follow Python and kfp best practises
- Minimize any other prose.
- The component has to follow the template and only add the following sections:`COMPONENT_NAME`, `CONTAINER_IMAGE`, `PACKAGES_TO_INSTALL`, `INPUT_VARIABLES`, `INPUT_VARIABLES_TYPE`, `INPUT_VARIABLES_DESCRIPTION`, `RETURN_VARIABLES`, `RETURN_VARIABLES_TYPE`, `RETURN_VARIABLES_DESCRIPTION`, `COMPONENT_CODE`, `BRIEF_COMPONENT_DESCRIPTION`.
"#;

/// Response template enumerating the fields the model fills in.
pub const COMPONENT_TEMPLATE_PROMPT: &str = r#"
Follow the following template to generate the code for your component:
```
from kfp.v2.dsl import Dataset, Input, Output, Model, component
from pathlib import Path


@component(
    base_image="{CONTAINER_IMAGE}",
    packages_to_install=[{PACKAGES_TO_INSTALL}],
    output_component_file=str(Path(__file__).with_suffix(".yaml")),
)
def {COMPONENT_NAME}(
    {INPUT_VARIABLES}: {INPUT_VARIABLES_TYPE},
) -> None:
    """{BRIEF_COMPONENT_DESCRIPTION}

    Args:
        {INPUT_VARIABLES} ({INPUT_VARIABLES_TYPE}): {INPUT_VARIABLES_DESCRIPTION}

    Returns:
        {RETURN_VARIABLES} ({RETURN_VARIABLES_TYPE}): {RETURN_VARIABLES_DESCRIPTION}
    """
    import logging

    logging.getLogger().setLevel(logging.INFO)

    import {PACKAGES_TO_INSTALL}
    {COMPONENT_CODE}

```
"#;

/// Follow-up turn asking for a unit test. `{COMPONENT_NAME}` is filled in.
pub const UNIT_TEST_PROMPT: &str = r#"
Write a unit test for the component code.
- Provide example input and output data for the component and test that the component runs successfully, providing the correct output.
- Any calls to external services, use the `mock` package to mock the response.
- Any uploads to GCS should be mocked.
- Import the component method as `from lib.component.{COMPONENT_NAME} import {COMPONENT_NAME}`.
"#;

/// Default review rubric; callers may replace it at runtime.
pub const REVIEW_PROMPT: &str = r#"
Review the following kfp component code snippets and return a snippet_name, accuracy_score (percentage %) and accuracy_summary for each component.

The accuracy_score should be in percentage format and based on how closely the snippets follows:
- Ability to complete the users request
- The correct python packages have been added to `packages_to_install` and then imported in the component method code.
- System kfp component template
- Penalise for importing component packages at the top of the snippet and not in the component method.
- Penalise for not importing the logging package in the component

--------
Return the message in the following JSON list structure

[
  {
    "snippet_name": int,
    "accuracy_score": int,
    "accuracy_summary": string
  }
]
"#;

/// Turn appended to a failing artifact's conversation. `{SUMMARY}` and
/// `{OUTPUT}` are filled in.
pub const FIX_PROMPT: &str = r#"
Running the unit test against the component failed.

Test summary:
{SUMMARY}

Test output:
```
{OUTPUT}
```

Fix the component so the test passes. Keep the same component name and template. Return only the corrected component code in a single code block.
"#;

/// Turn asking for the matching test after a fix.
pub const FIX_TEST_PROMPT: &str = r#"
Now return the corrected unit test for the fixed component in a single code block.
- Keep mocking every call to external services.
- Import the component method as `from lib.component.{COMPONENT_NAME} import {COMPONENT_NAME}`.
"#;

/// Description paired with the bundled worked example.
pub const DEFAULT_EXAMPLE_DESCRIPTION: &str = "Write a component that validates a CSV dataset against a Great Expectations suite and create Data Doc (a validation report). This component fails if validation is not successful.";

/// Path of the bundled worked example, relative to the project root.
pub const DEFAULT_EXAMPLE_PATH: &str = "assets/examples/great_expectations_validate_csv.py";

/// Sample descriptions offered by `compgen examples`.
pub const SAMPLE_DESCRIPTIONS: [&str; 3] = [
    "Write a component that ingests a .csv file from GCS bucket path {GCS_BUCKET_PATH: string} as a Google Vertex Dataset",
    "Write a component that ingests all .parquet files in GCS bucket path {GCS_BUCKET_PATH: string} and uploads them into Google Cloud BigQuery, {DATASET: string}:{TABLE: string}.",
    "Write a component that takes a GCS path containing multiple images (either .png or .json) {image_path: string} from a GCS bucket and uses grabcut to segment the images into a foreground and background. The component should output the foreground and background images to the GCS bucket in folder path {output_gcs_folder: string}.",
];
